//! Database isolation strategies
//!
//! - `snapshot`: whole-file copy of the database, restored on demand
//! - `transaction`: two-state savepoint scope, one per test
//! - `atomic`: staged temp-file copies so a destination is never half-written

mod atomic;
pub mod snapshot;
pub mod transaction;

pub use snapshot::{file_digest, SnapshotStore};
pub use transaction::TransactionIsolator;
