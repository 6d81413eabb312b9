//! SQLite-backed persisted index for one collection.
//!
//! The index lives in a single file, `index.sqlite`, inside the collection's
//! index directory. The file is only ever created by renaming a fully written
//! temporary file onto it, so its presence means a complete build finished.

use crate::types::Chunk;
use crate::vector_index::FlatIndex;
use chrono::{DateTime, Utc};
use medrag_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File whose presence marks a valid index.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

/// Bumped whenever the table layout changes.
pub const FORMAT_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE manifest (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE chunks (
    id INTEGER PRIMARY KEY,
    source_id TEXT NOT NULL,
    page INTEGER NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    text TEXT NOT NULL,
    hash TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

/// Metadata describing how an index was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub collection: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    /// SHA-256 over the loaded page texts
    pub source_fingerprint: String,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format_version", self.format_version.to_string()),
            ("collection", self.collection.clone()),
            ("embedding_provider", self.embedding_provider.clone()),
            ("embedding_model", self.embedding_model.clone()),
            ("dimensions", self.dimensions.to_string()),
            ("chunk_count", self.chunk_count.to_string()),
            ("source_fingerprint", self.source_fingerprint.clone()),
            ("built_at", self.built_at.to_rfc3339()),
        ]
    }

    fn from_rows(rows: HashMap<String, String>) -> AppResult<Self> {
        let get = |key: &str| {
            rows.get(key)
                .cloned()
                .ok_or_else(|| corrupt(format!("manifest is missing '{}'", key)))
        };
        let number = |key: &str| -> AppResult<usize> {
            get(key)?
                .parse()
                .map_err(|e| corrupt(format!("manifest '{}' is not a number: {}", key, e)))
        };

        let format_version = number("format_version")? as u32;
        if format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported index format version {} (expected {})",
                format_version, FORMAT_VERSION
            )));
        }

        let built_at = DateTime::parse_from_rfc3339(&get("built_at")?)
            .map_err(|e| corrupt(format!("manifest 'built_at' is invalid: {}", e)))?
            .with_timezone(&Utc);

        Ok(Self {
            format_version,
            collection: get("collection")?,
            embedding_provider: get("embedding_provider")?,
            embedding_model: get("embedding_model")?,
            dimensions: number("dimensions")?,
            chunk_count: number("chunk_count")?,
            source_fingerprint: get("source_fingerprint")?,
            built_at,
        })
    }
}

/// Path of the marker file inside an index directory.
pub fn index_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE_NAME)
}

/// Whether a completed index exists. Only stats the marker file.
pub fn index_exists(dir: &Path) -> bool {
    index_file(dir).is_file()
}

/// Write a complete index and publish it atomically.
///
/// Chunk positions must run `0..entries.len()`. On any failure the temporary
/// file is removed and no marker is created.
pub fn write_index(
    dir: &Path,
    manifest: &IndexManifest,
    entries: &[(Chunk, Vec<f32>)],
) -> AppResult<()> {
    fs::create_dir_all(dir).map_err(|e| storage("failed to create index directory", e))?;
    remove_stale_temp_files(dir)?;

    let temp = dir.join(format!("{}.{}.tmp", INDEX_FILE_NAME, Uuid::new_v4()));
    let result = write_database(&temp, manifest, entries).and_then(|_| publish(&temp, dir));

    if result.is_err() {
        remove_temp(&temp);
    }

    result
}

/// Read the manifest without loading any vectors.
pub fn read_manifest(dir: &Path) -> AppResult<IndexManifest> {
    let conn = open_read_only(dir)?;
    read_manifest_from(&conn)
}

/// Load and validate a persisted index.
///
/// Any inconsistency, or SQLite failing to read the file, is reported as
/// `AppError::IndexCorruption`.
pub fn load_index(dir: &Path) -> AppResult<(IndexManifest, FlatIndex)> {
    let conn = open_read_only(dir)?;
    let manifest = read_manifest_from(&conn)?;
    let blob_len = manifest.dimensions * 4;

    let mut stmt = conn
        .prepare(
            "SELECT id, source_id, page, start_offset, end_offset, text, hash, embedding
             FROM chunks ORDER BY id",
        )
        .map_err(|e| corrupt(format!("failed to query chunks: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let page: i64 = row.get(2)?;
            let start: i64 = row.get(3)?;
            let end: i64 = row.get(4)?;
            let embedding: Vec<u8> = row.get(7)?;
            Ok((
                Chunk {
                    position: id as u32,
                    source_id: row.get(1)?,
                    page: page as u32,
                    start: start as usize,
                    end: end as usize,
                    text: row.get(5)?,
                    hash: row.get(6)?,
                },
                id,
                embedding,
            ))
        })
        .map_err(|e| corrupt(format!("failed to query chunks: {}", e)))?;

    let mut entries = Vec::with_capacity(manifest.chunk_count);
    for (expected, row) in rows.enumerate() {
        let (chunk, id, bytes) = row.map_err(|e| corrupt(format!("unreadable chunk row: {}", e)))?;

        if id != expected as i64 {
            return Err(corrupt(format!("chunk ids are not contiguous at {}", id)));
        }
        if bytes.len() != blob_len {
            return Err(corrupt(format!(
                "chunk {} embedding has {} bytes, expected {}",
                id,
                bytes.len(),
                blob_len
            )));
        }

        entries.push((chunk, bytes_to_embedding(&bytes)));
    }

    if entries.len() != manifest.chunk_count {
        return Err(corrupt(format!(
            "manifest lists {} chunks but {} are stored",
            manifest.chunk_count,
            entries.len()
        )));
    }

    let index = FlatIndex::new(manifest.dimensions, entries).map_err(|e| corrupt(e.to_string()))?;

    tracing::debug!(
        "Loaded index for '{}' with {} chunks from {:?}",
        manifest.collection,
        manifest.chunk_count,
        dir
    );

    Ok((manifest, index))
}

/// Remove the marker so the next start rebuilds the index.
pub fn remove_index(dir: &Path) -> AppResult<()> {
    let path = index_file(dir);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| storage("failed to remove index", e))?;
        tracing::info!("Removed index file {:?}", path);
    }
    Ok(())
}

fn write_database(
    path: &Path,
    manifest: &IndexManifest,
    entries: &[(Chunk, Vec<f32>)],
) -> AppResult<()> {
    let mut conn =
        Connection::open(path).map_err(|e| storage("failed to create index file", e))?;

    conn.execute_batch(SCHEMA)
        .map_err(|e| storage("failed to create tables", e))?;

    let tx = conn
        .transaction()
        .map_err(|e| storage("failed to start transaction", e))?;
    {
        let mut insert_manifest = tx
            .prepare("INSERT INTO manifest (key, value) VALUES (?1, ?2)")
            .map_err(|e| storage("failed to prepare manifest insert", e))?;
        for (key, value) in manifest.rows() {
            insert_manifest
                .execute(params![key, value])
                .map_err(|e| storage("failed to insert manifest", e))?;
        }

        let mut insert_chunk = tx
            .prepare(
                "INSERT INTO chunks (id, source_id, page, start_offset, end_offset, text, hash, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| storage("failed to prepare chunk insert", e))?;
        for (expected, (chunk, embedding)) in entries.iter().enumerate() {
            if chunk.position as usize != expected {
                return Err(AppError::Storage(format!(
                    "chunk position {} is out of order (expected {})",
                    chunk.position, expected
                )));
            }
            if embedding.len() != manifest.dimensions {
                return Err(AppError::Storage(format!(
                    "chunk {} has {} dimensions, manifest declares {}",
                    chunk.position,
                    embedding.len(),
                    manifest.dimensions
                )));
            }

            insert_chunk
                .execute(params![
                    chunk.position as i64,
                    chunk.source_id,
                    chunk.page as i64,
                    chunk.start as i64,
                    chunk.end as i64,
                    chunk.text,
                    chunk.hash,
                    embedding_to_bytes(embedding),
                ])
                .map_err(|e| storage("failed to insert chunk", e))?;
        }
    }

    if entries.len() != manifest.chunk_count {
        return Err(AppError::Storage(format!(
            "manifest declares {} chunks but {} were given",
            manifest.chunk_count,
            entries.len()
        )));
    }

    tx.commit()
        .map_err(|e| storage("failed to commit index", e))?;
    conn.close()
        .map_err(|(_, e)| storage("failed to close index file", e))?;

    Ok(())
}

/// Flush the temporary file and rename it onto the marker.
fn publish(temp: &Path, dir: &Path) -> AppResult<()> {
    fs::File::open(temp)
        .and_then(|f| f.sync_all())
        .map_err(|e| storage("failed to sync index file", e))?;

    fs::rename(temp, index_file(dir)).map_err(|e| storage("failed to publish index", e))?;

    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }

    Ok(())
}

/// Delete leftovers of interrupted builds, including SQLite journals.
fn remove_stale_temp_files(dir: &Path) -> AppResult<()> {
    let prefix = format!("{}.", INDEX_FILE_NAME);
    let entries = fs::read_dir(dir).map_err(|e| storage("failed to list index directory", e))?;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.contains(".tmp") {
            tracing::warn!("Removing stale temporary index file {:?}", entry.path());
            fs::remove_file(entry.path())
                .map_err(|e| storage("failed to remove stale temporary file", e))?;
        }
    }

    Ok(())
}

fn remove_temp(temp: &Path) {
    let journal = PathBuf::from(format!("{}-journal", temp.display()));
    for path in [temp, journal.as_path()] {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to remove temporary file {:?}: {}", path, e);
            }
        }
    }
}

fn open_read_only(dir: &Path) -> AppResult<Connection> {
    let path = index_file(dir);
    if !path.is_file() {
        return Err(corrupt(format!("index file missing at {}", path.display())));
    }

    Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| corrupt(format!("failed to open {}: {}", path.display(), e)))
}

fn read_manifest_from(conn: &Connection) -> AppResult<IndexManifest> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM manifest")
        .map_err(|e| corrupt(format!("failed to read manifest: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| corrupt(format!("failed to read manifest: {}", e)))?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(|e| corrupt(format!("failed to read manifest: {}", e)))?;

    IndexManifest::from_rows(rows)
}

fn storage(context: &str, err: impl Display) -> AppError {
    AppError::Storage(format!("{}: {}", context, err))
}

fn corrupt(message: impl Into<String>) -> AppError {
    AppError::IndexCorruption(message.into())
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding. Length is checked by the caller.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
