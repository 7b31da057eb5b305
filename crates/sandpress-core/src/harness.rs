//! Harness-owned isolation context
//!
//! The test runner constructs one `IsolationContext` per process and calls
//! its hooks around the suite and around every test. The context owns the
//! connection channel and the object cache, so nothing else can hold a
//! handle across a rollback or restore; test bodies borrow them through
//! `channel_mut` / `cache_mut`.
//!
//! Hooks never fail. When isolation cannot be established they log a
//! warning and report `IsolationStatus::Degraded`; the test still runs.

use crate::capability::{ControlChannel, ObjectCache};
use crate::config::{IsolationConfig, IsolationMode};
use crate::errors::{IsoError, IsoErrorKind, IsolationError};
use crate::isolation::{SnapshotStore, TransactionIsolator};
use crate::types::{schema, RunId};

/// Outcome of a harness hook
#[derive(Debug, Clone)]
pub enum IsolationStatus {
    /// The hook did what the active mode requires
    Isolated,
    /// Isolation is turned off by configuration
    Disabled,
    /// Isolation could not be established; the test runs against current state
    Degraded(IsoError),
}

impl IsolationStatus {
    pub fn is_isolated(&self) -> bool {
        matches!(self, IsolationStatus::Isolated)
    }

    pub fn error(&self) -> Option<&IsoError> {
        match self {
            IsolationStatus::Degraded(e) => Some(e),
            _ => None,
        }
    }
}

/// One suite run's isolation state and collaborators
pub struct IsolationContext<C, K> {
    config: IsolationConfig,
    run_id: RunId,
    store: Option<SnapshotStore>,
    isolator: TransactionIsolator,
    channel: C,
    cache: K,
}

impl<C: ControlChannel, K: ObjectCache> IsolationContext<C, K> {
    /// `store` is `None` when no database file could be located
    pub fn new(
        config: IsolationConfig,
        store: Option<SnapshotStore>,
        channel: C,
        cache: K,
    ) -> Self {
        Self {
            config,
            run_id: RunId::new(),
            store,
            isolator: TransactionIsolator::new(),
            channel,
            cache,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn mode(&self) -> IsolationMode {
        self.config.mode
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&SnapshotStore> {
        self.store.as_ref()
    }

    pub fn isolator(&self) -> &TransactionIsolator {
        &self.isolator
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Borrow the connection for a test body; do not keep it past the test
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn cache(&self) -> &K {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut K {
        &mut self.cache
    }

    /// Capture the clean baseline. Call once, before the first test.
    pub fn start_suite(&mut self) -> IsolationStatus {
        tracing::info!(
            op = "start_suite",
            run_id = self.run_id.as_str(),
            mode = self.config.mode.as_str(),
        );
        if self.config.mode == IsolationMode::Disabled {
            return IsolationStatus::Disabled;
        }
        if self.isolator.is_active() {
            return self.degrade(
                "start_suite",
                IsolationError::ScopeActive {
                    op: "capture".to_string(),
                }
                .into(),
            );
        }

        let result = match self.store.as_mut() {
            Some(store) => store.capture(),
            // Transaction mode works without a snapshot; only hard_reset needs one.
            None if self.config.mode == IsolationMode::Transaction => {
                tracing::debug!(op = "start_suite", "no database file, snapshot fallback off");
                return IsolationStatus::Isolated;
            }
            None => Err(missing_store()),
        };
        match result {
            Ok(()) => IsolationStatus::Isolated,
            Err(e) => self.degrade("start_suite", e),
        }
    }

    /// Run before every test
    pub fn before_each(&mut self) -> IsolationStatus {
        match self.config.mode {
            IsolationMode::Disabled => IsolationStatus::Disabled,
            IsolationMode::Transaction => match self.isolator.begin(&mut self.channel) {
                Ok(()) => IsolationStatus::Isolated,
                Err(e) => self.degrade("before_each", e),
            },
            IsolationMode::Snapshot => {
                let result = match self.store.as_mut() {
                    Some(store) => store.restore(&mut self.channel, &mut self.cache),
                    None => Err(missing_store()),
                };
                match result {
                    Ok(()) => IsolationStatus::Isolated,
                    Err(e) => self.degrade("before_each", e),
                }
            }
        }
    }

    /// Run after every test
    pub fn after_each(&mut self) -> IsolationStatus {
        match self.config.mode {
            IsolationMode::Disabled => IsolationStatus::Disabled,
            IsolationMode::Transaction => {
                match self.isolator.rollback(&mut self.channel, &mut self.cache) {
                    Ok(()) => IsolationStatus::Isolated,
                    Err(e) => self.degrade("after_each", e),
                }
            }
            // The next before_each restores the file.
            IsolationMode::Snapshot => IsolationStatus::Isolated,
        }
    }

    /// Put the file back to the baseline in the middle of a test
    ///
    /// An open scope is rolled back through the live handle before the
    /// restore, then reopened on whatever handle the channel holds
    /// afterwards, so `after_each` always has a scope to pair with. A failed
    /// restore therefore never strands the test's savepoint on the
    /// connection.
    pub fn hard_reset(&mut self) -> IsolationStatus {
        if self.config.mode == IsolationMode::Disabled {
            return IsolationStatus::Disabled;
        }
        let had_scope = self.isolator.is_active();
        if let Err(e) = self.isolator.rollback(&mut self.channel, &mut self.cache) {
            return self.degrade("hard_reset", e);
        }

        let restored = match self.store.as_mut() {
            Some(store) => store.restore(&mut self.channel, &mut self.cache),
            None => Err(missing_store()),
        };
        let reopened = if had_scope {
            self.isolator.begin(&mut self.channel)
        } else {
            Ok(())
        };

        match (restored, reopened) {
            (Ok(()), Ok(())) => IsolationStatus::Isolated,
            (Err(e), _) | (Ok(()), Err(e)) => self.degrade("hard_reset", e),
        }
    }

    /// Close any open scope and delete the snapshot. Call once at the end.
    pub fn finish_suite(&mut self) -> IsolationStatus {
        if let Err(e) = self.isolator.rollback(&mut self.channel, &mut self.cache) {
            self.isolator.reset();
            return self.degrade("finish_suite", e);
        }
        let cleaned = match self.store.as_mut() {
            Some(store) => store.cleanup(),
            None => Ok(()),
        };
        if let Err(e) = cleaned {
            return self.degrade("finish_suite", e);
        }
        tracing::info!(op = "finish_suite", run_id = self.run_id.as_str());
        if self.config.mode == IsolationMode::Disabled {
            IsolationStatus::Disabled
        } else {
            IsolationStatus::Isolated
        }
    }

    /// Forget scope and snapshot state; the connection is assumed gone
    pub fn reset(&mut self) {
        self.isolator.reset();
        if let Some(store) = self.store.as_mut() {
            store.reset();
        }
    }

    /// Give the collaborators back to the caller
    pub fn into_parts(self) -> (C, K) {
        (self.channel, self.cache)
    }

    fn degrade(&self, op: &str, err: IsoError) -> IsolationStatus {
        tracing::warn!(
            op = op,
            event = schema::EVENT_DEGRADED,
            run_id = self.run_id.as_str(),
            mode = self.config.mode.as_str(),
            err.kind = ?err.kind(),
            err.code = err.code(),
            "isolation unavailable, test runs against current database state: {}",
            err
        );
        IsolationStatus::Degraded(err)
    }
}

fn missing_store() -> IsoError {
    IsoError::new(IsoErrorKind::Unavailable)
        .with_op("locate_database")
        .with_message("no database file located, snapshot isolation unavailable")
}
