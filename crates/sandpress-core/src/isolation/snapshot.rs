//! File-level database snapshot
//!
//! One clean copy of the live database file, captured once per suite and
//! copied back over the live file on demand. Restoring invalidates the open
//! connection handle and every cached read, so the store drives both
//! through the `ControlChannel` and `ObjectCache` capabilities.
//!
//! Both directions stage into a sibling temp file and rename it into place.
//! The one non-atomic window is in `restore`: stale SQLite sidecar files
//! (`-wal`, `-shm`, `-journal`) are removed just before the rename, so a
//! failing rename leaves the live file without them.

use super::atomic::{commit_staged, discard, stage_copy};
use crate::capability::{ControlChannel, ObjectCache};
use crate::config::IsolationConfig;
use crate::errors::{io_error, IsolationError, Result};
use crate::locate::{locate_project_root, resolve_database};
use crate::{log_op_end, log_op_error, log_op_start};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Snapshot of the live database file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    live_path: PathBuf,
    snapshot_path: PathBuf,
    has_snapshot: bool,
    captured_at: Option<DateTime<Utc>>,
    digest: Option<String>,
    settle_delay: Duration,
}

impl SnapshotStore {
    /// Create a store for explicit live/snapshot paths
    pub fn new(live_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            live_path: live_path.into(),
            snapshot_path: snapshot_path.into(),
            has_snapshot: false,
            captured_at: None,
            digest: None,
            settle_delay: Duration::ZERO,
        }
    }

    /// Create a store whose snapshot sits next to the live file
    pub fn for_database(live_path: impl Into<PathBuf>, suffix: &str) -> Self {
        let live_path = live_path.into();
        let snapshot_path = Self::snapshot_path_for(&live_path, suffix);
        Self::new(live_path, snapshot_path)
    }

    /// Resolve the live database from `cwd` and the configuration
    ///
    /// Finds the project root by walking up from `cwd`, then the database
    /// under it. Fails with `Unavailable` when either is missing.
    pub fn discover(cwd: &Path, config: &IsolationConfig) -> Result<Self> {
        let not_found = || IsolationError::DatabaseNotFound {
            searched_from: cwd.display().to_string(),
        };
        let live = match (&config.database, locate_project_root(cwd)) {
            (Some(db), _) if db.is_absolute() => db.is_file().then(|| db.clone()),
            (explicit, Some(root)) => resolve_database(&root, explicit.as_deref()),
            (Some(db), None) => resolve_database(cwd, Some(db.as_path())),
            (None, None) => None,
        }
        .ok_or_else(not_found)?;

        Ok(Self::for_database(live, &config.snapshot_suffix)
            .with_settle_delay(config.settle_delay()))
    }

    /// Conventional database locations under a project root
    pub fn locate_database(project_root: &Path) -> Option<PathBuf> {
        crate::locate::locate_database(project_root)
    }

    /// `live` with `suffix` appended to its file name
    pub fn snapshot_path_for(live: &Path, suffix: &str) -> PathBuf {
        let mut name = live.file_name().map(OsString::from).unwrap_or_default();
        name.push(suffix);
        live.with_file_name(name)
    }

    /// Pause between closing the handle and overwriting the live file
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn live_path(&self) -> &Path {
        &self.live_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// SHA-256 (hex) of the captured snapshot
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Copy the live database to the snapshot path
    ///
    /// Repeating a capture re-copies. The caller must make sure no write
    /// transaction is open on the live file.
    pub fn capture(&mut self) -> Result<()> {
        let started = Instant::now();
        log_op_start!("capture", live_path = %self.live_path.display());

        match self.capture_inner() {
            Ok(digest) => {
                log_op_end!(
                    "capture",
                    duration_ms = elapsed_ms(started),
                    digest = digest.as_str()
                );
                self.has_snapshot = true;
                self.captured_at = Some(Utc::now());
                self.digest = Some(digest);
                Ok(())
            }
            Err(e) => {
                log_op_error!("capture", e.clone(), duration_ms = elapsed_ms(started));
                Err(e)
            }
        }
    }

    fn capture_inner(&self) -> Result<String> {
        if !self.live_path.is_file() {
            return Err(IsolationError::LiveDatabaseMissing {
                path: self.live_path.display().to_string(),
            }
            .into());
        }
        let staged = stage_copy(&self.live_path, &self.snapshot_path)?;
        let digest = match file_digest(&staged) {
            Ok(d) => d,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };
        commit_staged(&staged, &self.snapshot_path)?;
        Ok(digest)
    }

    /// Copy the snapshot back over the live database
    ///
    /// In order: close the handle, wait the settle delay, stage the copy,
    /// drop stale sidecars, rename into place, reconnect, flush the cache.
    /// Without a prior capture this fails before touching anything.
    pub fn restore<C, K>(&mut self, channel: &mut C, cache: &mut K) -> Result<()>
    where
        C: ControlChannel + ?Sized,
        K: ObjectCache + ?Sized,
    {
        let started = Instant::now();
        log_op_start!(
            "restore",
            live_path = %self.live_path.display(),
            snapshot_path = %self.snapshot_path.display()
        );

        match self.restore_inner(channel, cache) {
            Ok(()) => {
                log_op_end!("restore", duration_ms = elapsed_ms(started));
                Ok(())
            }
            Err(e) => {
                log_op_error!("restore", e.clone(), duration_ms = elapsed_ms(started));
                Err(e)
            }
        }
    }

    fn restore_inner<C, K>(&mut self, channel: &mut C, cache: &mut K) -> Result<()>
    where
        C: ControlChannel + ?Sized,
        K: ObjectCache + ?Sized,
    {
        if !self.has_snapshot {
            return Err(IsolationError::NoSnapshotCaptured.into());
        }
        if !self.snapshot_path.is_file() {
            self.has_snapshot = false;
            self.digest = None;
            return Err(IsolationError::SnapshotFileMissing {
                path: self.snapshot_path.display().to_string(),
            }
            .into());
        }

        channel.close()?;
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }

        let replaced = stage_copy(&self.snapshot_path, &self.live_path).and_then(|staged| {
            if let Err(e) = self.remove_sidecars() {
                discard(&staged);
                return Err(e);
            }
            commit_staged(&staged, &self.live_path)
        });

        // Reconnect even when the copy failed so the caller can retry.
        let reconnected = channel.reconnect();
        match (replaced, reconnected) {
            (Ok(()), reconnected) => {
                cache.flush();
                reconnected
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(reconnect_err)) => Err(e.with_source(reconnect_err)),
        }
    }

    fn remove_sidecars(&self) -> Result<()> {
        for suffix in SIDECAR_SUFFIXES {
            let sidecar = Self::snapshot_path_for(&self.live_path, suffix);
            match fs::remove_file(&sidecar) {
                Ok(()) => {
                    tracing::debug!(path = %sidecar.display(), "removed stale sidecar");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("remove_sidecar", &sidecar, e)),
            }
        }
        Ok(())
    }

    /// Delete the snapshot file and clear the flag; absent files are fine
    pub fn cleanup(&mut self) -> Result<()> {
        self.has_snapshot = false;
        self.captured_at = None;
        self.digest = None;

        match fs::remove_file(&self.snapshot_path) {
            Ok(()) => {
                tracing::info!(
                    op = "cleanup",
                    snapshot_path = %self.snapshot_path.display(),
                    "snapshot removed"
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("cleanup", &self.snapshot_path, e)),
        }
    }

    /// Adopt a snapshot file written by an earlier capture
    ///
    /// Returns whether a snapshot is now available.
    pub fn resume(&mut self) -> Result<bool> {
        if !self.snapshot_path.is_file() {
            return Ok(false);
        }
        let digest = file_digest(&self.snapshot_path)?;
        let modified = fs::metadata(&self.snapshot_path)
            .and_then(|m| m.modified())
            .map_err(|e| io_error("resume", &self.snapshot_path, e))?;

        self.has_snapshot = true;
        self.captured_at = Some(DateTime::<Utc>::from(modified));
        self.digest = Some(digest);
        Ok(true)
    }

    /// Forget the in-memory snapshot state without touching the disk
    pub fn reset(&mut self) {
        self.has_snapshot = false;
        self.captured_at = None;
        self.digest = None;
    }

    /// Whether the live file currently matches the captured snapshot
    pub fn live_matches_snapshot(&self) -> Result<bool> {
        let Some(expected) = self.digest.as_deref() else {
            return Err(IsolationError::NoSnapshotCaptured.into());
        };
        if !self.live_path.is_file() {
            return Ok(false);
        }
        Ok(file_digest(&self.live_path)? == expected)
    }
}

/// SHA-256 of a file's contents, hex encoded
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| io_error("digest", path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_error("digest", path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
