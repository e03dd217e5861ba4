//! # Domain Value Objects
//!
//! Immutable value types shared by transactors and providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a logical backend within one call chain.
///
/// Used as the binding name of a transaction handle inside a [`Scope`](super::Scope).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(Arc<str>);

impl BackendId {
    /// Create an identity from a name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Identity of one shard inside a shard group, e.g. `users:user1`.
    pub fn sharded(group: &str, shard_key: &str) -> Self {
        Self(format!("{group}:{shard_key}").into())
    }

    /// Borrow the identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Propagation policy of one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Propagation {
    /// Join an active transaction, begin one if none exists.
    Required,
    /// Always begin a new transaction, shadowing any active one.
    RequiresNew,
}

/// Transactor state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxState {
    /// No handle bound for this identity.
    #[default]
    NoActiveTransaction,
    /// A handle is bound and the body may run.
    ActiveTransaction,
    /// Commit or rollback has been issued and is in flight.
    Releasing,
    /// Handle committed.
    Committed,
    /// Handle rolled back.
    RolledBack,
}

impl TxState {
    /// Check if transition to next state is valid.
    pub fn can_transition_to(&self, next: TxState) -> bool {
        matches!(
            (self, next),
            (Self::NoActiveTransaction, Self::ActiveTransaction)
                | (Self::ActiveTransaction, Self::Releasing)
                | (Self::Releasing, Self::Committed)
                | (Self::Releasing, Self::RolledBack)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// Why a handle was rolled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackReason {
    /// The body returned an error.
    BodyError,
    /// The body panicked.
    Panic,
    /// The body succeeded under the rollback-only option.
    RollbackOnly,
    /// The invocation was dropped before completing.
    Cancelled,
    /// Commit failed and the handle is released.
    CommitFailed,
}

impl RollbackReason {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BodyError => "error",
            Self::Panic => "panic",
            Self::RollbackOnly => "rollback_only",
            Self::Cancelled => "cancelled",
            Self::CommitFailed => "commit_failed",
        }
    }
}
