use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use super::Embedder;

/// Deterministic embedder for tests: counts characters into fixed buckets.
#[derive(Debug)]
pub(crate) struct BucketEmbedder {
    model: String,
    dimension: usize,
    pub(crate) document_calls: AtomicUsize,
    pub(crate) query_calls: AtomicUsize,
}

impl BucketEmbedder {
    pub(crate) fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            dimension: 16,
            document_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for c in text.chars() {
            if let Some(slot) = vector.get_mut(c as usize % self.dimension) {
                *slot += 1.0;
            }
        }
        vector
    }
}

impl Embedder for BucketEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed(text))
    }
}

/// Embedder whose every call fails.
#[derive(Debug, Default)]
pub(crate) struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow::anyhow!("embedding server unavailable"))
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow::anyhow!("embedding server unavailable"))
    }
}

/// Embedder that works for the first `healthy_calls` document batches and
/// fails afterwards.
#[derive(Debug)]
pub(crate) struct FlakyEmbedder {
    inner: BucketEmbedder,
    healthy_calls: usize,
}

impl FlakyEmbedder {
    pub(crate) fn new(healthy_calls: usize) -> Self {
        Self {
            inner: BucketEmbedder::new("bucket"),
            healthy_calls,
        }
    }
}

impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.inner.document_calls.load(Ordering::SeqCst);
        if call >= self.healthy_calls {
            return Err(anyhow::anyhow!("embedding server unavailable"));
        }
        self.inner.embed_documents(texts)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed_query(text)
    }
}
