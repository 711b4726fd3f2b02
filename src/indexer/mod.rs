// Indexer module
// Keeps the searchable index in sync with the document directory.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::{VectorStore, VectorStoreManager};
use crate::embeddings::{Embedder, TextSplitter};
use crate::loader::DocumentLoader;
use crate::{RagError, Result};

/// Summary of a retrain or append run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingStats {
    pub files_loaded: usize,
    pub files_unsupported: usize,
    pub files_failed: usize,
    pub documents: usize,
    pub chunks: usize,
    /// Chunks in the active index afterwards.
    pub indexed_chunks: usize,
}

/// Snapshot of the active index for `status` and `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub chunk_count: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub snapshot_path: PathBuf,
}

/// Owns the active index.
///
/// Readers clone the current `Arc<VectorStore>` and release the lock at once,
/// so a query always runs against a complete index, old or new. Retrain and
/// append runs are serialized on the writer mutex and publish the new index
/// with a single pointer swap.
pub struct Indexer {
    document_dir: PathBuf,
    vector_db_path: PathBuf,
    loader: Arc<DocumentLoader>,
    splitter: TextSplitter,
    embedding_model: String,
    index: RwLock<Option<Arc<VectorStore>>>,
    writer: Arc<Mutex<VectorStoreManager>>,
}

impl std::fmt::Debug for Indexer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("document_dir", &self.document_dir)
            .field("vector_db_path", &self.vector_db_path)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_loader(config, embedder, DocumentLoader::new())
    }

    #[inline]
    pub fn with_loader(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        loader: DocumentLoader,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunking.clone())?;
        let embedding_model = embedder.model_name().to_string();
        let manager = VectorStoreManager::new(embedder).with_progress(progress_bar());

        Ok(Self {
            document_dir: config.document_dir(),
            vector_db_path: config.vector_db_path(),
            loader: Arc::new(loader),
            splitter,
            embedding_model,
            index: RwLock::new(None),
            writer: Arc::new(Mutex::new(manager)),
        })
    }

    #[inline]
    pub fn document_dir(&self) -> &Path {
        &self.document_dir
    }

    #[inline]
    pub fn vector_db_path(&self) -> &Path {
        &self.vector_db_path
    }

    /// The index queries should use right now, if any.
    #[inline]
    pub async fn current(&self) -> Option<Arc<VectorStore>> {
        self.index.read().await.clone()
    }

    /// Load the saved snapshot, rebuilding from the document directory when
    /// it is missing or unreadable.
    #[inline]
    pub async fn initialize(&self) -> Result<()> {
        let mut manager = Arc::clone(&self.writer).lock_owned().await;
        let path = self.vector_db_path.clone();

        let loaded = tokio::task::spawn_blocking(move || manager.load(&path))
            .await
            .map_err(join_error)?;

        match loaded {
            Ok(store) => {
                info!(
                    "Vector store loaded on startup ({} chunks)",
                    store.len()
                );
                self.publish(Some(store)).await;
                Ok(())
            }
            Err(RagError::IndexNotFound(path)) => {
                info!(
                    "No vector store at {}, building from {}",
                    path.display(),
                    self.document_dir.display()
                );
                self.retrain().await.map(|_| ())
            }
            Err(e) => {
                error!("Failed to load vector store: {}, rebuilding", e);
                self.retrain().await.map(|_| ())
            }
        }
    }

    /// Reload every document, rebuild the index and replace the snapshot.
    ///
    /// When the directory yields no chunks the snapshot is removed and the
    /// active index cleared. If embedding fails the previous index stays.
    #[inline]
    pub async fn retrain(&self) -> Result<IndexingStats> {
        let mut manager = Arc::clone(&self.writer).lock_owned().await;
        let loader = Arc::clone(&self.loader);
        let splitter = self.splitter.clone();
        let document_dir = self.document_dir.clone();
        let db_path = self.vector_db_path.clone();

        info!("Retraining vector store from {}", document_dir.display());

        let (mut stats, store) = tokio::task::spawn_blocking(move || -> Result<_> {
            let report = loader.load_directory(&document_dir)?;
            let chunks = splitter.split_documents(&report.documents);

            let mut stats = IndexingStats {
                files_loaded: report.loaded.len(),
                files_unsupported: report.unsupported.len(),
                files_failed: report.failed.len(),
                documents: report.documents.len(),
                chunks: chunks.len(),
                indexed_chunks: 0,
            };

            if chunks.is_empty() {
                warn!(
                    "No chunks produced from {}, removing vector store at {}",
                    document_dir.display(),
                    db_path.display()
                );
                manager.remove_snapshot(&db_path)?;
                return Ok((stats, None));
            }

            let store = manager.create(chunks)?;
            manager.save(&db_path)?;
            stats.indexed_chunks = store.len();
            Ok((stats, Some(store)))
        })
        .await
        .map_err(join_error)??;

        let indexed = store.as_ref().map(|s| s.len()).unwrap_or_default();
        self.publish(store).await;
        stats.indexed_chunks = indexed;

        info!(
            "Retrain complete: {} files, {} documents, {} chunks",
            stats.files_loaded, stats.documents, stats.chunks
        );
        Ok(stats)
    }

    /// Load `paths`, chunk them and append the chunks to the saved index.
    ///
    /// Every file must load. Chunks already in the index are not detected,
    /// so appending the same file twice indexes it twice.
    #[inline]
    pub async fn append_files(&self, paths: Vec<PathBuf>) -> Result<IndexingStats> {
        let mut manager = Arc::clone(&self.writer).lock_owned().await;
        let loader = Arc::clone(&self.loader);
        let splitter = self.splitter.clone();
        let db_path = self.vector_db_path.clone();

        let (stats, store) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut documents = Vec::new();
            for path in &paths {
                documents.extend(loader.load_file(path)?);
            }
            let chunks = splitter.split_documents(&documents);

            let mut stats = IndexingStats {
                files_loaded: paths.len(),
                documents: documents.len(),
                chunks: chunks.len(),
                ..IndexingStats::default()
            };

            if chunks.is_empty() {
                warn!("Appended files produced no chunks, index unchanged");
                stats.indexed_chunks = manager.current().map(|s| s.len()).unwrap_or_default();
                return Ok((stats, None));
            }

            let store = manager.add(chunks, &db_path)?;
            stats.indexed_chunks = store.len();
            Ok((stats, Some(store)))
        })
        .await
        .map_err(join_error)??;

        if let Some(store) = store {
            self.publish(Some(store)).await;
        }

        info!(
            "Appended {} chunks from {} files",
            stats.chunks, stats.files_loaded
        );
        Ok(stats)
    }

    #[inline]
    pub async fn status(&self) -> IndexStatus {
        let current = self.current().await;

        IndexStatus {
            loaded: current.is_some(),
            chunk_count: current.as_ref().map(|s| s.len()).unwrap_or_default(),
            dimension: current.as_ref().map(|s| s.dimension()).unwrap_or_default(),
            embedding_model: self.embedding_model.clone(),
            snapshot_path: self.vector_db_path.clone(),
        }
    }

    async fn publish(&self, store: Option<Arc<VectorStore>>) {
        *self.index.write().await = store;
    }
}

fn join_error(e: tokio::task::JoinError) -> RagError {
    RagError::Other(anyhow::anyhow!("Indexing task failed: {}", e))
}

fn progress_bar() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    match ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}") {
        Ok(style) => bar.with_style(style),
        Err(_) => bar,
    }
}
