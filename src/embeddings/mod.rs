pub mod chunking;
#[cfg(test)]
pub(crate) mod fake;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, TextSplitter, chunk_documents};
pub use ollama::OllamaClient;

use anyhow::Result;

/// Turns text into dense vectors. Documents and queries go through separate
/// methods so a model can treat them differently.
pub trait Embedder: Send + Sync {
    /// Name recorded in the vector store so a snapshot is never queried with
    /// a different model than the one that built it.
    fn model_name(&self) -> &str;

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
