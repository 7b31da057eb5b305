//! Capabilities the isolation core asks of its collaborators
//!
//! The core never owns a concrete database client. It issues two control
//! commands, asks for the handle to be closed or reopened, and signals the
//! application's object cache to drop everything it holds.

use crate::errors::Result;

/// Control commands sent through the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Open one isolation level; the connection maps it to a savepoint push
    StartTransaction,
    /// Undo back to the most recent savepoint and pop it
    Rollback,
}

impl ControlCommand {
    /// The SQL-like form of the command
    pub fn as_sql(&self) -> &'static str {
        match self {
            ControlCommand::StartTransaction => "START TRANSACTION",
            ControlCommand::Rollback => "ROLLBACK",
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Connection command channel
///
/// Implementations translate `ControlCommand`s into whatever nesting
/// primitive the database offers and expose an explicit handle lifecycle.
pub trait ControlChannel {
    /// Execute a control command; returns once the database acknowledged it
    fn execute(&mut self, command: ControlCommand) -> Result<()>;

    /// Close the handle; returns only after the file descriptor is released
    fn close(&mut self) -> Result<()>;

    /// Drop any cached handle and open a fresh one
    fn reconnect(&mut self) -> Result<()>;

    /// Whether a handle is currently open
    fn is_open(&self) -> bool;
}

/// Application-level read-through cache that must forget everything when
/// the database changes out-of-band
pub trait ObjectCache {
    /// Invalidate all cached reads. Idempotent.
    fn flush(&mut self);
}

/// Cache for setups without an object cache
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl ObjectCache for NullCache {
    fn flush(&mut self) {}
}

impl<T: ObjectCache + ?Sized> ObjectCache for Box<T> {
    fn flush(&mut self) {
        (**self).flush()
    }
}

impl<T: ControlChannel + ?Sized> ControlChannel for Box<T> {
    fn execute(&mut self, command: ControlCommand) -> Result<()> {
        (**self).execute(command)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn reconnect(&mut self) -> Result<()> {
        (**self).reconnect()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
