//! SQLite catalog access.
//!
//! One database file holds the entire catalog: scan sessions, the file
//! inventory, completed-directory bookkeeping, extracted metadata, and the
//! placement plan. Ownership between tables is expressed as foreign keys with
//! ON DELETE CASCADE, so dropping a session prunes everything it produced.

mod models;
mod schema;
pub mod sessions;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub use models::{ParsedFilename, ScanSession, ScanStatus};
pub use schema::SCHEMA;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    /// Open (creating if needed) the catalog at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog at {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// In-memory catalog for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize catalog schema")?;
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Current wall-clock time as the (fractional unix, whole seconds) pair the
/// catalog stores everywhere.
pub fn now_pair() -> (f64, i64) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    (now, now as i64)
}
