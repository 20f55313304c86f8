//! SQL DDL for the on-disk feature store.
//!
//! `images` holds one row per entry: the index, both metadata fields and the
//! embedding blob, so a row can never lose its partner. `store_meta` records
//! the schema version and what built the store.

use rusqlite::Connection;

/// The schema version that the current binary reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- idx is the matrix row; embedding is `dimensions` little-endian f32 values
CREATE TABLE IF NOT EXISTS images (
    idx INTEGER PRIMARY KEY CHECK(idx >= 0),
    relative_path TEXT NOT NULL,
    category TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

/// Initialize all tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Read a `store_meta` value, if present.
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM store_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}
