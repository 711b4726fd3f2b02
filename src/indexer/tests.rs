use std::fs;
use std::sync::atomic::Ordering;

use super::*;
use crate::database::snapshot;
use crate::embeddings::fake::{BucketEmbedder, FailingEmbedder};
use tempfile::TempDir;

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

fn write_doc(config: &Config, name: &str, content: &str) -> PathBuf {
    let dir = config.document_dir();
    fs::create_dir_all(&dir).expect("should create document dir");
    let path = dir.join(name);
    fs::write(&path, content).expect("should write document");
    path
}

fn indexer(config: &Config, embedder: Arc<BucketEmbedder>) -> Indexer {
    Indexer::new(config, embedder).expect("should create indexer")
}

#[tokio::test]
async fn retrain_builds_and_saves_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "Học phí ngành Cơ khí năm 2025");
    write_doc(&config, "b.md", "Điểm chuẩn xét tuyển");
    write_doc(&config, "ignored.bin", "binary");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    let stats = indexer.retrain().await.expect("retrain should succeed");

    assert_eq!(stats.files_loaded, 2);
    assert_eq!(stats.files_unsupported, 1);
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.indexed_chunks, 2);
    assert!(snapshot::exists(&config.vector_db_path()));
    assert_eq!(indexer.current().await.expect("index").len(), 2);
}

#[tokio::test]
async fn retrain_with_no_documents_removes_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let doc = write_doc(&config, "a.txt", "nội dung");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    indexer.retrain().await.expect("first retrain");
    assert!(indexer.current().await.is_some());

    fs::remove_file(doc).expect("should remove document");
    let stats = indexer.retrain().await.expect("empty retrain is not an error");

    assert_eq!(stats.chunks, 0);
    assert!(indexer.current().await.is_none());
    assert!(!config.vector_db_path().exists());
}

#[tokio::test]
async fn retrain_keeps_reader_views_intact() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "một");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    indexer.retrain().await.expect("first retrain");
    let reader = indexer.current().await.expect("index");

    write_doc(&config, "b.txt", "hai");
    indexer.retrain().await.expect("second retrain");

    assert_eq!(reader.len(), 1);
    assert_eq!(indexer.current().await.expect("index").len(), 2);
}

#[tokio::test]
async fn initialize_builds_missing_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "tuyển sinh");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    indexer.initialize().await.expect("initialize");

    assert_eq!(indexer.status().await.chunk_count, 1);
    assert!(snapshot::exists(&config.vector_db_path()));
}

#[tokio::test]
async fn initialize_loads_existing_snapshot_without_embedding() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "tuyển sinh");
    indexer(&config, Arc::new(BucketEmbedder::new("bucket")))
        .retrain()
        .await
        .expect("retrain");

    let embedder = Arc::new(BucketEmbedder::new("bucket"));
    let second = indexer(&config, embedder.clone());
    second.initialize().await.expect("initialize");

    assert_eq!(second.status().await.chunk_count, 1);
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_rebuilds_when_model_changed() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "tuyển sinh");
    indexer(&config, Arc::new(BucketEmbedder::new("old-model")))
        .retrain()
        .await
        .expect("retrain");

    let embedder = Arc::new(BucketEmbedder::new("new-model"));
    let second = indexer(&config, embedder.clone());
    second.initialize().await.expect("initialize");

    let status = second.status().await;
    assert_eq!(status.embedding_model, "new-model");
    assert_eq!(status.chunk_count, 1);
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn append_files_extends_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "một");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    indexer.retrain().await.expect("retrain");

    let added = write_doc(&config, "b.txt", "hai");
    let stats = indexer.append_files(vec![added]).await.expect("append");

    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.indexed_chunks, 2);
    assert_eq!(indexer.current().await.expect("index").len(), 2);
}

#[tokio::test]
async fn append_without_index_creates_one() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let added = write_doc(&config, "a.txt", "một");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    indexer.append_files(vec![added]).await.expect("append");

    assert!(snapshot::exists(&config.vector_db_path()));
    assert_eq!(indexer.status().await.chunk_count, 1);
}

#[tokio::test]
async fn append_unsupported_file_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let added = write_doc(&config, "a.exe", "MZ");

    let indexer = indexer(&config, Arc::new(BucketEmbedder::new("bucket")));
    let result = indexer.append_files(vec![added]).await;

    assert!(matches!(result, Err(RagError::UnsupportedFile(_))));
    assert!(indexer.current().await.is_none());
}

#[tokio::test]
async fn embedding_failure_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    write_doc(&config, "a.txt", "một");

    let indexer = Indexer::new(&config, Arc::new(FailingEmbedder)).expect("indexer");
    let result = indexer.retrain().await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(indexer.current().await.is_none());
    assert!(!config.vector_db_path().exists());
}

#[tokio::test]
async fn status_without_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let status = indexer(&config, Arc::new(BucketEmbedder::new("bucket")))
        .status()
        .await;

    assert!(!status.loaded);
    assert_eq!(status.chunk_count, 0);
    assert_eq!(status.snapshot_path, config.vector_db_path());
}
