//! Local bookmark database.
//!
//! Provides SQLite connection management and schema migrations.
//!
//! # Usage
//!
//! ```no_run
//! use bookmark_modal::database::Database;
//!
//! let db = Database::open(Database::default_path()).expect("failed to open database");
//!
//! // Or keep everything in memory
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
