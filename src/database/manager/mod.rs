
use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::snapshot;
use super::{SearchResult, VectorStore};
use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};

/// Owns the active index and is the only writer of on-disk snapshots.
///
/// The active index is shared as an `Arc`. Mutations copy it when readers
/// still hold the previous version, so a reader never sees a half-updated
/// index.
pub struct VectorStoreManager {
    embedder: Arc<dyn Embedder>,
    current: Option<Arc<VectorStore>>,
    progress: ProgressBar,
}

impl std::fmt::Debug for VectorStoreManager {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreManager")
            .field("embedding_model", &self.embedder.model_name())
            .field("current", &self.current)
            .finish()
    }
}

impl VectorStoreManager {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            current: None,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report embedding progress on `progress` instead of a hidden bar.
    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    #[inline]
    pub fn set_progress(&mut self, progress: ProgressBar) {
        self.progress = progress;
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Build a fresh index from `chunks`, replacing the active one.
    #[inline]
    pub fn create(&mut self, chunks: Vec<Chunk>) -> Result<Arc<VectorStore>> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        self.progress.set_length(chunks.len() as u64);
        self.progress.set_position(0);

        let store = Arc::new(VectorStore::from_chunks(
            Arc::clone(&self.embedder),
            chunks,
            &self.progress,
        )?);

        self.progress.finish_and_clear();
        self.current = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Persist the active index to `path`. Without an index this only warns.
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        match &self.current {
            Some(store) => store.save(path),
            None => {
                warn!(
                    "No vector store to save to {}, skipping",
                    path.display()
                );
                Ok(())
            }
        }
    }

    /// Load the snapshot at `path` and make it the active index.
    #[inline]
    pub fn load(&mut self, path: &Path) -> Result<Arc<VectorStore>> {
        let store = Arc::new(VectorStore::load(path, Arc::clone(&self.embedder))?);
        self.current = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Append `chunks` to the snapshot at `path`.
    ///
    /// Without a snapshot at `path` this is `create` followed by `save`.
    /// Otherwise the snapshot is loaded, extended and written back. Duplicate
    /// chunks are not detected.
    #[inline]
    pub fn add(&mut self, chunks: Vec<Chunk>, path: &Path) -> Result<Arc<VectorStore>> {
        if !snapshot::exists(path) {
            info!(
                "No vector store at {}, creating a new one",
                path.display()
            );
            let store = self.create(chunks)?;
            self.save(path)?;
            return Ok(store);
        }

        let mut store = self.load(path)?;
        if chunks.is_empty() {
            debug!("Nothing to add to {}", path.display());
            return Ok(store);
        }

        self.progress.set_length(chunks.len() as u64);
        self.progress.set_position(0);

        // Drop our own handle so make_mut only copies when readers hold one.
        self.current = None;
        let appended = Arc::make_mut(&mut store)
            .append(chunks, &self.progress)
            .and_then(|added| store.save(path).map(|()| added));
        self.progress.finish_and_clear();

        let added = match appended {
            Ok(added) => added,
            Err(e) => {
                // The snapshot on disk is untouched; go back to serving it.
                warn!("Failed to add chunks to {}: {}", path.display(), e);
                if let Err(reload) = self.load(path) {
                    warn!("Could not reload {}: {}", path.display(), reload);
                }
                return Err(e);
            }
        };
        self.current = Some(Arc::clone(&store));

        info!(
            "Added {} chunks to {} ({} total)",
            added,
            path.display(),
            store.len()
        );
        Ok(store)
    }

    /// Search the active index. Without an index the result is empty.
    #[inline]
    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        match &self.current {
            Some(store) => store.similarity_search(query, k),
            None => {
                debug!("similarity_search called without an index");
                Ok(Vec::new())
            }
        }
    }

    #[inline]
    pub fn current(&self) -> Option<Arc<VectorStore>> {
        self.current.clone()
    }

    /// Forget the active index and delete the snapshot at `path`.
    #[inline]
    pub fn remove_snapshot(&mut self, path: &Path) -> Result<bool> {
        self.current = None;
        snapshot::remove(path)
    }
}
