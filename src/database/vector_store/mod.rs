
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use indicatif::ProgressBar;
use tracing::{debug, info};

use super::snapshot::{self, Manifest};
use super::{EmbeddingRecord, SearchResult, squared_l2};
use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};

/// Chunks sent to the embedder per call, so progress can be reported.
const EMBED_GROUP_SIZE: usize = 64;

/// Exact nearest-neighbour index over chunk embeddings.
///
/// Records are append-only and keep their insertion position, which also
/// breaks distance ties so results are deterministic.
#[derive(Clone)]
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    records: Vec<EmbeddingRecord>,
    dimension: usize,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("embedding_model", &self.embedder.model_name())
            .field("records", &self.records.len())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl VectorStore {
    /// Embed `chunks` and build a new index. Fails on an empty corpus.
    #[inline]
    pub fn from_chunks(
        embedder: Arc<dyn Embedder>,
        chunks: Vec<Chunk>,
        progress: &ProgressBar,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let vectors = embed_chunks(embedder.as_ref(), &chunks, progress)?;
        let dimension = vectors.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(RagError::Embedding(
                "Embedder returned empty vectors".to_string(),
            ));
        }

        let mut store = Self {
            embedder,
            records: Vec::with_capacity(chunks.len()),
            dimension,
        };
        store.push_records(chunks, vectors)?;

        info!(
            "Built vector store with {} chunks ({} dimensions)",
            store.records.len(),
            store.dimension
        );
        Ok(store)
    }

    /// Load a snapshot written by [`VectorStore::save`].
    ///
    /// The snapshot must have been built with the same embedding model as
    /// `embedder`, otherwise queries would be compared in a different space.
    #[inline]
    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let manifest = snapshot::read_manifest(path)?;
        if manifest.embedding_model != embedder.model_name() {
            return Err(RagError::EmbeddingMismatch {
                expected: embedder.model_name().to_string(),
                found: manifest.embedding_model,
            });
        }

        let (manifest, records) = snapshot::read(path)?;

        info!(
            "Loaded vector store with {} chunks from {}",
            records.len(),
            path.display()
        );

        Ok(Self {
            embedder,
            records,
            dimension: manifest.dimension,
        })
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        let manifest = Manifest {
            embedding_model: self.embedder.model_name().to_string(),
            dimension: self.dimension,
            chunk_count: self.records.len(),
            created_at: Utc::now(),
        };

        snapshot::write(path, &manifest, &self.records)
    }

    /// Embed and append more chunks. No deduplication is done.
    #[inline]
    pub fn append(&mut self, chunks: Vec<Chunk>, progress: &ProgressBar) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = embed_chunks(self.embedder.as_ref(), &chunks, progress)?;
        let added = chunks.len();
        self.push_records(chunks, vectors)?;

        debug!("Appended {} chunks, index now holds {}", added, self.records.len());
        Ok(added)
    }

    /// Embed `query` with the index's embedder and return the `k` nearest
    /// chunks by ascending distance.
    #[inline]
    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed_query(query)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vector.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "Query embedding has {} dimensions, index has {}",
                vector.len(),
                self.dimension
            )));
        }

        Ok(self.search_by_vector(&vector, k))
    }

    #[inline]
    pub fn search_by_vector(&self, vector: &[f32], k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(f32, usize)> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (squared_l2(&record.vector, vector), position))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(k)
            .filter_map(|(distance, position)| {
                self.records.get(position).map(|record| SearchResult {
                    chunk: record.chunk.clone(),
                    distance,
                    position,
                })
            })
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    #[inline]
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    fn push_records(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::Embedding(format!(
                "Embedding has {} dimensions, index has {}",
                bad.len(),
                self.dimension
            )));
        }

        self.records.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord::new(vector, chunk)),
        );
        Ok(())
    }
}

fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    progress: &ProgressBar,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(chunks.len());

    for group in chunks.chunks(EMBED_GROUP_SIZE) {
        let texts: Vec<String> = group.iter().map(|c| c.content.clone()).collect();
        let embedded = embedder
            .embed_documents(&texts)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if embedded.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                embedded.len(),
                texts.len()
            )));
        }

        vectors.extend(embedded);
        progress.inc(group.len() as u64);
    }

    Ok(vectors)
}
