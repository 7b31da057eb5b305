//! Error handling for sandpress-store
//!
//! Wraps sandpress-core IsoError with store-specific helpers

use sandpress_core::errors::{IsoError, IsoErrorKind};

pub use sandpress_core::errors::io_error;

/// Result type alias using IsoError
pub type Result<T> = std::result::Result<T, IsoError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> IsoError {
    IsoError::new(IsoErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an invalid identifier error
pub fn invalid_identifier(name: &str) -> IsoError {
    IsoError::new(IsoErrorKind::InvalidInput)
        .with_op("checksum")
        .with_message(format!("Not a plain table name: {:?}", name))
}
