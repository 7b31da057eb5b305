//! sandpress store - SQLite side of the isolation core
//!
//! Provides:
//! - `SqliteChannel`: a `ControlChannel` over a rusqlite connection that maps
//!   `START TRANSACTION` / `ROLLBACK` onto a stack of savepoints
//! - Connection opening/configuration for snapshot-friendly database files
//! - Table and database checksums for asserting isolation in tests

pub mod channel;
pub mod checksum;
pub mod db;
pub mod errors;

// Re-export key types
pub use channel::SqliteChannel;
pub use checksum::{database_checksum, table_checksum};
pub use errors::Result;
