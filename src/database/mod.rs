// Vector store: an exact in-memory index over chunk embeddings, persisted as
// redb snapshots.


pub mod manager;
pub mod snapshot;
pub mod vector_store;

pub use manager::VectorStoreManager;
pub use snapshot::Manifest;
pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::Chunk;

/// One indexed chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            chunk,
        }
    }
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
    /// Insertion position of the chunk in the index
    pub position: usize,
}

/// Squared Euclidean distance. Vectors of different length compare over the
/// shared prefix.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
