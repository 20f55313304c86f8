//! Durable storage for [`FeatureStore`]: one SQLite file per store.
//!
//! [`save`] writes a complete new file next to the target and renames it into
//! place, so readers only ever see a finished store. [`load`] refuses files
//! whose indices are not exactly `0..N` or whose blobs have the wrong length.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use super::schema::{self, CURRENT_SCHEMA_VERSION};
use super::{FeatureStore, FeatureStoreBuilder, ImageRecord};

/// Summary of a stored feature store, read from `store_meta`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub schema_version: u32,
    pub dimensions: usize,
    pub model: Option<String>,
    pub built_at: Option<String>,
    pub image_count: usize,
}

/// Serialize an embedding as little-endian f32 bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]. `None` if the length is not a multiple of 4.
pub fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// `<file name>.tmp` next to `path`. Never equal to `path` itself.
pub fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `store` to `path`, replacing whatever was there.
pub fn save(store: &FeatureStore, path: impl AsRef<Path>, model: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let tmp_path = sibling_tmp_path(path);
    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path)
            .with_context(|| format!("failed to remove stale {}", tmp_path.display()))?;
    }

    {
        let mut conn = Connection::open(&tmp_path)
            .with_context(|| format!("failed to create store at {}", tmp_path.display()))?;
        schema::init_schema(&conn).context("failed to initialize schema")?;

        let tx = conn.transaction()?;
        schema::set_meta(&tx, "schema_version", &CURRENT_SCHEMA_VERSION.to_string())?;
        schema::set_meta(&tx, "dimensions", &store.dimensions().to_string())?;
        schema::set_meta(&tx, "model", model)?;
        schema::set_meta(&tx, "built_at", &chrono::Utc::now().to_rfc3339())?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO images (idx, relative_path, category, embedding) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (idx, embedding, record) in store.iter() {
                let bytes = embedding_to_bytes(&embedding.to_vec());
                stmt.execute(params![
                    idx as i64,
                    record.relative_path,
                    record.category,
                    bytes
                ])?;
            }
        }
        tx.commit().context("failed to commit feature store")?;
    }

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move store into place at {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        images = store.len(),
        dimensions = store.dimensions(),
        "feature store written"
    );
    Ok(())
}

/// Load the store at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<FeatureStore> {
    load_with_info(path).map(|(store, _)| store)
}

/// Load the store and its metadata.
pub fn load_with_info(path: impl AsRef<Path>) -> Result<(FeatureStore, StoreInfo)> {
    let path = path.as_ref();
    let conn = open_read_only(path)?;
    let info = read_info(&conn)?;

    let mut builder = FeatureStoreBuilder::with_capacity(info.dimensions, info.image_count);
    let mut stmt = conn.prepare(
        "SELECT idx, relative_path, category, embedding FROM images ORDER BY idx",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let idx: i64 = row.get(0)?;
        let record = ImageRecord {
            relative_path: row.get(1)?,
            category: row.get(2)?,
        };
        let blob: Vec<u8> = row.get(3)?;

        if idx != builder.len() as i64 {
            bail!(
                "feature store {} is corrupt: expected index {}, found {idx}",
                path.display(),
                builder.len()
            );
        }
        let embedding = bytes_to_embedding(&blob)
            .filter(|e| e.len() == info.dimensions)
            .with_context(|| {
                format!(
                    "feature store {} is corrupt: entry {idx} has {} bytes, expected {}",
                    path.display(),
                    blob.len(),
                    info.dimensions * 4
                )
            })?;
        builder.push(&embedding, record)?;
    }

    let store = builder.finish();
    tracing::info!(
        path = %path.display(),
        images = store.len(),
        dimensions = store.dimensions(),
        "feature store loaded"
    );
    Ok((store, info))
}

/// Read only the metadata of the store at `path`.
pub fn inspect(path: impl AsRef<Path>) -> Result<StoreInfo> {
    let conn = open_read_only(path.as_ref())?;
    read_info(&conn)
}

fn open_read_only(path: &Path) -> Result<Connection> {
    anyhow::ensure!(
        path.exists(),
        "feature store not found at {}. Run `lookalike index` first.",
        path.display()
    );
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open feature store at {}", path.display()))
}

fn read_info(conn: &Connection) -> Result<StoreInfo> {
    let schema_version: u32 = schema::get_meta(conn, "schema_version")?
        .context("feature store has no schema version")?
        .parse()
        .context("feature store schema version is not a number")?;
    anyhow::ensure!(
        schema_version == CURRENT_SCHEMA_VERSION,
        "feature store schema version {schema_version} is not supported (expected {CURRENT_SCHEMA_VERSION}); rebuild it with `lookalike index`"
    );

    let dimensions: usize = schema::get_meta(conn, "dimensions")?
        .context("feature store has no dimensions entry")?
        .parse()
        .context("feature store dimensions entry is not a number")?;

    let image_count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;

    Ok(StoreInfo {
        schema_version,
        dimensions,
        model: schema::get_meta(conn, "model")?,
        built_at: schema::get_meta(conn, "built_at")?,
        image_count: image_count as usize,
    })
}
