//! SQLite control channel
//!
//! Translates the isolation core's control commands into nested savepoints:
//!
//! | command             | SQL                                                    |
//! |---------------------|--------------------------------------------------------|
//! | `START TRANSACTION` | `SAVEPOINT sandpress_sp_<depth>`                       |
//! | `ROLLBACK`          | `ROLLBACK TO` + `RELEASE` of the most recent savepoint |
//!
//! The channel owns its connection. `close` hands the handle to SQLite's
//! close and returns only once the file descriptor is released; open
//! savepoints die with it.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use sandpress_core::errors::IsolationError;
use sandpress_core::{ControlChannel, ControlCommand};
use std::path::{Path, PathBuf};

/// Savepoint-translating channel over a file-backed SQLite connection
pub struct SqliteChannel {
    path: PathBuf,
    conn: Option<Connection>,
    depth: usize,
}

impl SqliteChannel {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = db::open(&path)?;
        Ok(Self {
            path,
            conn: Some(conn),
            depth: 0,
        })
    }

    /// A channel that starts closed; the first `reconnect` opens it
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            depth: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of savepoints currently pushed
    pub fn savepoint_depth(&self) -> usize {
        self.depth
    }

    /// Borrow the live connection
    ///
    /// Do not hold on to it across a rollback or restore.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| IsolationError::ConnectionClosed.into())
    }

    pub fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| IsolationError::ConnectionClosed.into())
    }

    fn savepoint_name(depth: usize) -> String {
        format!("sandpress_sp_{}", depth)
    }

    fn push_savepoint(&mut self) -> Result<()> {
        let name = Self::savepoint_name(self.depth);
        self.connection()?
            .execute_batch(&format!("SAVEPOINT {}", name))
            .map_err(from_rusqlite)?;
        self.depth += 1;
        tracing::trace!(savepoint = name.as_str(), depth = self.depth, "savepoint pushed");
        Ok(())
    }

    fn pop_savepoint(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(IsolationError::NoSavepoint.into());
        }
        let name = Self::savepoint_name(self.depth - 1);
        self.connection()?
            .execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"
            ))
            .map_err(from_rusqlite)?;
        self.depth -= 1;
        tracing::trace!(savepoint = name.as_str(), depth = self.depth, "savepoint rolled back");
        Ok(())
    }
}

impl ControlChannel for SqliteChannel {
    fn execute(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::StartTransaction => self.push_savepoint(),
            ControlCommand::Rollback => self.pop_savepoint(),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            self.depth = 0;
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                self.depth = 0;
                tracing::debug!(path = %self.path.display(), "connection closed");
                Ok(())
            }
            Err((conn, err)) => {
                self.conn = Some(conn);
                Err(from_rusqlite(err).with_op("close").with_path(&self.path))
            }
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        self.close()?;
        let conn = db::open_existing(&self.path)
            .map_err(|e| e.with_op("reconnect").with_path(&self.path))?;
        self.conn = Some(conn);
        tracing::debug!(path = %self.path.display(), "connection reopened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandpress_core::errors::IsoErrorKind;
    use tempfile::TempDir;

    fn channel() -> (SqliteChannel, TempDir) {
        let dir = TempDir::new().unwrap();
        let channel = SqliteChannel::open(dir.path().join("site.db")).unwrap();
        channel
            .connection()
            .unwrap()
            .execute_batch("CREATE TABLE t (v INTEGER)")
            .unwrap();
        (channel, dir)
    }

    fn count(channel: &SqliteChannel) -> i64 {
        channel
            .connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_savepoint_names_follow_depth() {
        assert_eq!(SqliteChannel::savepoint_name(0), "sandpress_sp_0");
        assert_eq!(SqliteChannel::savepoint_name(3), "sandpress_sp_3");
    }

    #[test]
    fn test_nested_savepoints_unwind_in_order() {
        let (mut channel, _dir) = channel();

        channel.execute(ControlCommand::StartTransaction).unwrap();
        channel
            .connection()
            .unwrap()
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap();
        channel.execute(ControlCommand::StartTransaction).unwrap();
        channel
            .connection()
            .unwrap()
            .execute("INSERT INTO t VALUES (2)", [])
            .unwrap();
        assert_eq!(channel.savepoint_depth(), 2);

        channel.execute(ControlCommand::Rollback).unwrap();
        assert_eq!(count(&channel), 1);

        channel.execute(ControlCommand::Rollback).unwrap();
        assert_eq!(count(&channel), 0);
        assert_eq!(channel.savepoint_depth(), 0);
    }

    #[test]
    fn test_rollback_without_savepoint_is_rejected() {
        let (mut channel, _dir) = channel();

        let err = channel.execute(ControlCommand::Rollback).unwrap_err();

        assert_eq!(err.kind(), IsoErrorKind::PreconditionViolation);
    }

    #[test]
    fn test_closed_channel_reports_unavailable() {
        let (mut channel, _dir) = channel();
        channel.close().unwrap();
        channel.close().unwrap();

        assert!(!channel.is_open());
        assert_eq!(
            channel.connection().unwrap_err().kind(),
            IsoErrorKind::Unavailable
        );
        assert!(channel.execute(ControlCommand::StartTransaction).is_err());
        assert_eq!(channel.savepoint_depth(), 0);
    }

    #[test]
    fn test_close_discards_open_savepoints() {
        let (mut channel, _dir) = channel();
        channel.execute(ControlCommand::StartTransaction).unwrap();
        channel
            .connection()
            .unwrap()
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap();

        channel.reconnect().unwrap();

        assert_eq!(channel.savepoint_depth(), 0);
        assert_eq!(count(&channel), 0);
    }

    #[test]
    fn test_detached_channel_opens_on_reconnect() {
        let (mut first, dir) = channel();
        first.close().unwrap();

        let mut channel = SqliteChannel::detached(dir.path().join("site.db"));
        assert!(!channel.is_open());
        channel.reconnect().unwrap();
        assert_eq!(count(&channel), 0);
    }

    #[test]
    fn test_reconnect_to_vanished_file_fails() {
        let (mut channel, dir) = channel();
        channel.close().unwrap();
        std::fs::remove_file(dir.path().join("site.db")).unwrap();

        let err = channel.reconnect().unwrap_err();

        assert_eq!(err.kind(), IsoErrorKind::Persistence);
        assert!(!dir.path().join("site.db").exists());
    }
}
