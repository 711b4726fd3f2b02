
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redb::{Database, ReadOnlyDatabase, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::EmbeddingRecord;
use crate::embeddings::Chunk;
use crate::{RagError, Result};

pub const SNAPSHOT_FILE: &str = "index.redb";

const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");
const CHUNKS: TableDefinition<u64, &str> = TableDefinition::new("chunks");
const MANIFEST: TableDefinition<&str, &str> = TableDefinition::new("manifest");
const MANIFEST_KEY: &str = "manifest";

/// Describes a snapshot; checked before any vector is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredChunk {
    id: Uuid,
    chunk: Chunk,
}

fn db_err(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::Database(format!("{}: {}", context, e))
}

/// Whether `path` holds a snapshot file.
#[inline]
pub fn exists(path: &Path) -> bool {
    path.join(SNAPSHOT_FILE).is_file()
}

/// Write a complete snapshot to `path`.
///
/// The database is built in a sibling staging directory and renamed over the
/// target, so readers never observe a partially written snapshot.
#[inline]
pub fn write(path: &Path, manifest: &Manifest, records: &[EmbeddingRecord]) -> Result<()> {
    if manifest.chunk_count != records.len() {
        return Err(RagError::Database(format!(
            "Manifest lists {} chunks but {} records were given",
            manifest.chunk_count,
            records.len()
        )));
    }

    let staging = sibling(path, "staging")?;
    if let Some(parent) = staging.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(&staging)?;

    if let Err(e) = write_database(&staging.join(SNAPSHOT_FILE), manifest, records) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            warn!(
                "Failed to clean up staging directory {}: {}",
                staging.display(),
                cleanup
            );
        }
        return Err(e);
    }

    replace_dir(&staging, path)?;

    info!(
        "Saved vector store snapshot with {} chunks to {}",
        records.len(),
        path.display()
    );
    Ok(())
}

fn write_database(file: &Path, manifest: &Manifest, records: &[EmbeddingRecord]) -> Result<()> {
    let db = Database::create(file).map_err(|e| db_err("Failed to create snapshot", e))?;

    let manifest_json = serde_json::to_string(manifest)
        .map_err(|e| db_err("Failed to serialize manifest", e))?;

    let txn = db
        .begin_write()
        .map_err(|e| db_err("Failed to begin write transaction", e))?;
    {
        let mut vectors = txn
            .open_table(VECTORS)
            .map_err(|e| db_err("Failed to open vectors table", e))?;
        let mut chunks = txn
            .open_table(CHUNKS)
            .map_err(|e| db_err("Failed to open chunks table", e))?;
        let mut meta = txn
            .open_table(MANIFEST)
            .map_err(|e| db_err("Failed to open manifest table", e))?;

        for (position, record) in records.iter().enumerate() {
            let key = position as u64;
            let bytes: &[u8] = bytemuck::cast_slice(&record.vector);
            vectors
                .insert(key, bytes)
                .map_err(|e| db_err("Failed to write vector", e))?;

            let stored = serde_json::to_string(&StoredChunk {
                id: record.id,
                chunk: record.chunk.clone(),
            })
            .map_err(|e| db_err("Failed to serialize chunk", e))?;
            chunks
                .insert(key, stored.as_str())
                .map_err(|e| db_err("Failed to write chunk", e))?;
        }

        meta.insert(MANIFEST_KEY, manifest_json.as_str())
            .map_err(|e| db_err("Failed to write manifest", e))?;
    }
    txn.commit()
        .map_err(|e| db_err("Failed to commit snapshot", e))?;

    Ok(())
}

/// Read the manifest without loading any vectors.
#[inline]
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let db = open(path)?;
    let txn = db
        .begin_read()
        .map_err(|e| db_err("Failed to begin read transaction", e))?;
    read_manifest_in(&txn)
}

/// Read a snapshot back into memory, validating it against its manifest.
#[inline]
pub fn read(path: &Path) -> Result<(Manifest, Vec<EmbeddingRecord>)> {
    let db = open(path)?;
    let txn = db
        .begin_read()
        .map_err(|e| db_err("Failed to begin read transaction", e))?;

    let manifest = read_manifest_in(&txn)?;

    let vectors = txn
        .open_table(VECTORS)
        .map_err(|e| db_err("Failed to open vectors table", e))?;
    let chunks = txn
        .open_table(CHUNKS)
        .map_err(|e| db_err("Failed to open chunks table", e))?;

    let mut records = Vec::with_capacity(manifest.chunk_count);
    let expected_bytes = manifest.dimension * std::mem::size_of::<f32>();

    for (position, entry) in vectors
        .iter()
        .map_err(|e| db_err("Failed to iterate vectors", e))?
        .enumerate()
    {
        let (key, value) = entry.map_err(|e| db_err("Failed to read vector", e))?;
        if key.value() != position as u64 {
            return Err(RagError::Database(format!(
                "Snapshot is missing vector {}",
                position
            )));
        }

        let bytes = value.value();
        if bytes.len() != expected_bytes {
            return Err(RagError::Database(format!(
                "Vector {} has {} bytes, expected {}",
                position,
                bytes.len(),
                expected_bytes
            )));
        }
        let vector: Vec<f32> = bytemuck::pod_collect_to_vec(bytes);

        let stored_json = chunks
            .get(key.value())
            .map_err(|e| db_err("Failed to read chunk", e))?
            .ok_or_else(|| {
                RagError::Database(format!("Snapshot is missing chunk {}", position))
            })?;
        let stored: StoredChunk = serde_json::from_str(stored_json.value())
            .map_err(|e| db_err("Failed to parse chunk", e))?;

        records.push(EmbeddingRecord {
            id: stored.id,
            vector,
            chunk: stored.chunk,
        });
    }

    if records.len() != manifest.chunk_count {
        return Err(RagError::Database(format!(
            "Snapshot holds {} vectors but its manifest lists {}",
            records.len(),
            manifest.chunk_count
        )));
    }

    debug!(
        "Read {} records ({} dimensions) from {}",
        records.len(),
        manifest.dimension,
        path.display()
    );

    Ok((manifest, records))
}

/// Delete the snapshot at `path`. Returns whether anything was removed.
#[inline]
pub fn remove(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    fs::remove_dir_all(path)?;
    info!("Removed vector store snapshot at {}", path.display());
    Ok(true)
}

fn open(path: &Path) -> Result<ReadOnlyDatabase> {
    if !exists(path) {
        return Err(RagError::IndexNotFound(path.to_path_buf()));
    }

    ReadOnlyDatabase::open(path.join(SNAPSHOT_FILE))
        .map_err(|e| db_err("Failed to open snapshot", e))
}

fn read_manifest_in(txn: &redb::ReadTransaction) -> Result<Manifest> {
    let table = txn
        .open_table(MANIFEST)
        .map_err(|e| db_err("Failed to open manifest table", e))?;
    let json = table
        .get(MANIFEST_KEY)
        .map_err(|e| db_err("Failed to read manifest", e))?
        .ok_or_else(|| RagError::Database("Snapshot has no manifest".to_string()))?;

    serde_json::from_str(json.value()).map_err(|e| db_err("Failed to parse manifest", e))
}

/// A unique hidden path next to `path`, used for staging and backups.
fn sibling(path: &Path, purpose: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            RagError::Database(format!("Invalid snapshot path: {}", path.display()))
        })?;

    Ok(path.with_file_name(format!(".{}.{}-{}", name, purpose, Uuid::new_v4())))
}

/// Move `staging` to `target`, replacing any existing directory.
fn replace_dir(staging: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        fs::rename(staging, target)?;
        return Ok(());
    }

    let backup = sibling(target, "old")?;
    fs::rename(target, &backup)?;

    if let Err(e) = fs::rename(staging, target) {
        // Put the previous snapshot back before reporting the failure.
        if let Err(restore) = fs::rename(&backup, target) {
            warn!(
                "Failed to restore previous snapshot from {}: {}",
                backup.display(),
                restore
            );
        }
        return Err(e.into());
    }

    if let Err(e) = fs::remove_dir_all(&backup) {
        warn!(
            "Failed to remove previous snapshot at {}: {}",
            backup.display(),
            e
        );
    }

    Ok(())
}
