use std::path::Path;
use thiserror::Error;

/// Result type alias using IsoError
pub type Result<T> = std::result::Result<T, IsoError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code. The harness uses the kind to
/// decide between degrading to "no isolation" and reporting a misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoErrorKind {
    /// A required collaborator (database file, connection) is absent
    Unavailable,
    NotFound,
    /// Ordering misuse, e.g. restore before capture
    PreconditionViolation,
    Io,
    Persistence,
    InvalidInput,
    Config,
    Internal,
}

impl IsoErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            IsoErrorKind::Unavailable => "ERR_UNAVAILABLE",
            IsoErrorKind::NotFound => "ERR_NOT_FOUND",
            IsoErrorKind::PreconditionViolation => "ERR_PRECONDITION_VIOLATION",
            IsoErrorKind::Io => "ERR_IO",
            IsoErrorKind::Persistence => "ERR_PERSISTENCE",
            IsoErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            IsoErrorKind::Config => "ERR_CONFIG",
            IsoErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
#[derive(Debug, Clone)]
pub struct IsoError {
    kind: IsoErrorKind,
    op: Option<String>,
    path: Option<String>,
    message: String,
    source: Option<Box<IsoError>>,
}

impl IsoError {
    /// Create a new error with the specified kind
    pub fn new(kind: IsoErrorKind) -> Self {
        Self {
            kind,
            op: None,
            path: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add filesystem path context
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().display().to_string());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: IsoError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> IsoErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&IsoError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for IsoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for IsoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

/// Create an IO error for the given operation
pub fn io_error(op: &str, path: impl AsRef<Path>, err: std::io::Error) -> IsoError {
    IsoError::new(IsoErrorKind::Io)
        .with_op(op.to_string())
        .with_path(path)
        .with_message(err.to_string())
}

// ========== End Error Facility ==========

/// Concrete isolation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IsolationError {
    /// No project root or database file could be found
    #[error("Database not found (searched from {searched_from})")]
    DatabaseNotFound { searched_from: String },

    /// The live database file does not exist
    #[error("Live database file does not exist: {path}")]
    LiveDatabaseMissing { path: String },

    /// restore() called before any successful capture()
    #[error("No snapshot has been captured")]
    NoSnapshotCaptured,

    /// The snapshot flag is set but the file has vanished
    #[error("Snapshot file is missing: {path}")]
    SnapshotFileMissing { path: String },

    /// The connection handle is closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// An operation that needs a quiescent database ran inside an open scope
    #[error("Isolation scope is active during {op}")]
    ScopeActive { op: String },

    /// A rollback reached the channel with no savepoint to roll back to
    #[error("No savepoint to roll back to")]
    NoSavepoint,

    /// Unknown isolation mode string
    #[error("Invalid isolation mode: {value}")]
    InvalidMode { value: String },

    /// Configuration could not be read or parsed
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<IsolationError> for IsoError {
    fn from(err: IsolationError) -> Self {
        let message = err.to_string();
        match err {
            IsolationError::DatabaseNotFound { .. } => {
                IsoError::new(IsoErrorKind::Unavailable).with_op("locate_database")
            }
            IsolationError::LiveDatabaseMissing { path } => {
                IsoError::new(IsoErrorKind::Unavailable).with_path(path)
            }
            IsolationError::NoSnapshotCaptured => {
                IsoError::new(IsoErrorKind::PreconditionViolation).with_op("restore")
            }
            IsolationError::SnapshotFileMissing { path } => {
                IsoError::new(IsoErrorKind::NotFound).with_path(path)
            }
            IsolationError::ConnectionClosed => IsoError::new(IsoErrorKind::Unavailable),
            IsolationError::ScopeActive { op } => {
                IsoError::new(IsoErrorKind::PreconditionViolation).with_op(op)
            }
            IsolationError::NoSavepoint => {
                IsoError::new(IsoErrorKind::PreconditionViolation).with_op("rollback")
            }
            IsolationError::InvalidMode { .. } => IsoError::new(IsoErrorKind::InvalidInput),
            IsolationError::InvalidConfig { .. } => IsoError::new(IsoErrorKind::Config),
        }
        .with_message(message)
    }
}
