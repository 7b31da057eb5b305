//! sandpress core - database isolation for CMS test suites
//!
//! This crate provides the pieces that give every test a clean database
//! without re-provisioning the schema:
//! - `SnapshotStore`: whole-file snapshot of the SQLite database, restored on demand
//! - `TransactionIsolator`: two-state begin/rollback scope over a control channel
//! - `IsolationContext`: the harness-owned object wiring both into suite/test hooks
//! - Capability traits for the connection and the object cache
//! - Error, logging and configuration facilities shared by the other crates
//!
//! The SQLite-backed channel lives in `sandpress-store`.

pub mod cache;
pub mod capability;
pub mod config;
pub mod errors;
pub mod harness;
pub mod isolation;
pub mod locate;
pub mod logging_facility;

pub use sandpress_core_types as types;

// Re-export commonly used types
pub use cache::MemoryCache;
pub use capability::{ControlChannel, ControlCommand, NullCache, ObjectCache};
pub use config::{IsolationConfig, IsolationMode};
pub use errors::{IsoError, IsoErrorKind, IsolationError, Result};
pub use harness::{IsolationContext, IsolationStatus};
pub use isolation::{SnapshotStore, TransactionIsolator};
