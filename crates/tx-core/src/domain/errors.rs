//! # Domain Errors
//!
//! Error types for transaction propagation.
//!
//! Body failures are handed back to the caller unchanged; the variants below
//! cover what the engine itself can fail on.

use super::value_objects::BackendId;
use thiserror::Error;

/// Failures reported by a backend adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Write attempted inside a read-only transaction.
    #[error("Read only transaction doesn't support write operation: {0}")]
    ReadOnlyViolation(String),

    /// Operation needs an active read-write transaction.
    #[error("Read write transaction is required: {0}")]
    TransactionRequired(String),

    /// Operation is not supported in the current mode.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No capacity left to open another transaction.
    #[error("Backend exhausted: {open} of {max} transactions open")]
    Exhausted {
        /// Currently open transactions
        open: usize,
        /// Configured maximum
        max: usize,
    },

    /// Handle was already committed or rolled back.
    #[error("Transaction already finished: {0}")]
    TransactionFinished(String),

    /// Commit rejected because of a concurrent write.
    #[error("Transaction aborted by conflict: {0}")]
    Conflict(String),

    /// Referenced object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Fault injected by a test harness.
    #[error("Injected fault: {0}")]
    Injected(String),
}

/// Hash-slot routing failures. Always configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Sharding pool has no connections.
    #[error("No connections configured")]
    NoConnections,

    /// Partition parameters cannot route every slot.
    #[error("Invalid partition: {connections} connections over max slot {max_slot}")]
    InvalidPartition {
        /// Number of connections requested
        connections: usize,
        /// Upper bound of the hash space
        max_slot: u32,
    },

    /// Boundaries do not cover the computed slot.
    #[error("No partition owns slot {slot} (max slot {max_slot})")]
    SlotNotFound {
        /// Slot computed for the shard key
        slot: u32,
        /// Upper bound of the hash space
        max_slot: u32,
    },

    /// Boundaries violate the partition invariants.
    #[error("Malformed partition: {0}")]
    MalformedPartition(String),

    /// Shard key value absent from the scope.
    #[error("Shard key not present in scope: {0}")]
    MissingShardKey(String),
}

/// Errors surfaced by `required` / `requires_new`.
#[derive(Debug, Error)]
pub enum TxError {
    /// Backend could not open a transaction; the body never ran.
    #[error("Begin failed on {backend}: {source}")]
    Begin {
        /// Identity of the backend
        backend: BackendId,
        /// Backend failure
        #[source]
        source: BackendError,
    },

    /// Backend rejected the commit after the body succeeded.
    #[error("Commit failed on {backend}: {source}")]
    Commit {
        /// Identity of the backend
        backend: BackendId,
        /// Backend failure
        #[source]
        source: BackendError,
    },

    /// Shard routing failed.
    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// Client operation failed inside a unit of work.
    #[error("Backend operation failed: {0}")]
    Backend(#[from] BackendError),

    /// Unit of work failed for a caller-defined reason.
    #[error("Unit of work aborted: {0}")]
    Aborted(String),

    /// Unit of work failed; its own error is returned to the caller by `TransactorExt`.
    #[error("Unit of work failed")]
    BodyFailed,

    /// Unit of work finished without recording an outcome.
    #[error("Unit of work completed without an outcome")]
    MissingOutcome,
}

impl TxError {
    /// Abort the current unit of work with a message.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }

    /// Metric label for the stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "begin",
            Self::Commit { .. } => "commit",
            Self::Routing(_) => "routing",
            Self::Backend(_) | Self::Aborted(_) | Self::BodyFailed | Self::MissingOutcome => "body",
        }
    }
}
