//! SQLite connection management for the local bookmark store.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! and runs schema migrations on open.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use super::migrations;
use crate::platform;

/// File name of the bookmark database inside the data directory.
pub const DATABASE_FILE: &str = "bookmarks.db";

/// Database wrapper owning one `rusqlite::Connection`.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) a SQLite database at `path` and runs migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the connection cannot be established or migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        migrations::run_all(&db.conn)?;
        Ok(db)
    }

    /// Opens an in-memory database. Used by tests and by hosts that only
    /// keep bookmarks for the lifetime of the process.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        migrations::run_all(&db.conn)?;
        Ok(db)
    }

    /// Default location: `<data dir>/bookmarks.db`.
    pub fn default_path() -> PathBuf {
        platform::get_data_dir().join(DATABASE_FILE)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
