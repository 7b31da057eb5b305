//! Per-test transaction scope
//!
//! A two-state machine (Idle, InScope). `begin` sends one
//! `START TRANSACTION` and `rollback` one `ROLLBACK` through the channel;
//! the channel turns those into a savepoint push and pop. Repeated calls in
//! the same state are no-ops. Exactly one level of nesting is supported.

use crate::capability::{ControlChannel, ControlCommand, ObjectCache};
use crate::errors::Result;
use crate::types::ScopeId;
use crate::{log_op_end, log_op_error, log_op_start};
use std::time::Instant;

/// Savepoint-backed isolation scope
#[derive(Debug, Default)]
pub struct TransactionIsolator {
    scope: Option<ScopeId>,
}

impl TransactionIsolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a scope is currently open
    pub fn is_active(&self) -> bool {
        self.scope.is_some()
    }

    /// Id of the open scope, if any
    pub fn scope_id(&self) -> Option<&ScopeId> {
        self.scope.as_ref()
    }

    /// Open a scope. No-op when one is already open.
    ///
    /// On error the isolator stays idle.
    pub fn begin<C>(&mut self, channel: &mut C) -> Result<()>
    where
        C: ControlChannel + ?Sized,
    {
        if self.is_active() {
            return Ok(());
        }

        let started = Instant::now();
        let scope = ScopeId::new();
        log_op_start!("begin", scope_id = scope.as_str());

        match channel.execute(ControlCommand::StartTransaction) {
            Ok(()) => {
                log_op_end!(
                    "begin",
                    duration_ms = started.elapsed().as_millis() as u64,
                    scope_id = scope.as_str()
                );
                self.scope = Some(scope);
                Ok(())
            }
            Err(e) => {
                log_op_error!(
                    "begin",
                    e.clone(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    scope_id = scope.as_str()
                );
                Err(e)
            }
        }
    }

    /// Undo the open scope and flush the object cache. No-op when idle.
    ///
    /// If the channel rejects the rollback the scope stays open, so the
    /// caller can retry or `reset` once the connection is known to be gone.
    /// The cache is flushed either way.
    pub fn rollback<C, K>(&mut self, channel: &mut C, cache: &mut K) -> Result<()>
    where
        C: ControlChannel + ?Sized,
        K: ObjectCache + ?Sized,
    {
        let Some(scope) = self.scope.as_ref() else {
            return Ok(());
        };

        let started = Instant::now();
        log_op_start!("rollback", scope_id = scope.as_str());

        let result = channel.execute(ControlCommand::Rollback);
        cache.flush();

        match result {
            Ok(()) => {
                log_op_end!(
                    "rollback",
                    duration_ms = started.elapsed().as_millis() as u64,
                    scope_id = scope.as_str()
                );
                self.scope = None;
                Ok(())
            }
            Err(e) => {
                log_op_error!(
                    "rollback",
                    e.clone(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    scope_id = scope.as_str()
                );
                Err(e)
            }
        }
    }

    /// Return to idle without sending anything
    pub fn reset(&mut self) {
        if let Some(scope) = self.scope.take() {
            tracing::debug!(op = "reset", scope_id = scope.as_str(), "scope abandoned");
        }
    }
}
