
use tracing::debug;

use crate::Result;
use crate::config::RetrievalConfig;
use crate::database::VectorStore;
use crate::embeddings::Chunk;

/// Fixed-`k` similarity search over whatever index is active.
#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    #[inline]
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.top_k)
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Nearest chunks to `question`, closest first. No index means no context.
    #[inline]
    pub fn retrieve(&self, index: Option<&VectorStore>, question: &str) -> Result<Vec<Chunk>> {
        let Some(index) = index else {
            debug!("No vector store loaded, returning empty context");
            return Ok(Vec::new());
        };

        let results = index.similarity_search(question, self.k)?;
        debug!("Retrieved {} chunks for question", results.len());

        Ok(results.into_iter().map(|result| result.chunk).collect())
    }
}

impl Default for Retriever {
    #[inline]
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}
