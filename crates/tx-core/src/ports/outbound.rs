//! # Outbound Ports
//!
//! Traits the engine needs from backends: the transaction capability and the
//! connection lookup.

use crate::domain::{BackendError, Scope, TxConfig, TxError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Transaction capability of one physical backend connection.
///
/// Execution methods are backend-specific and live on the client facades.
#[async_trait]
pub trait TxBackend: Send + Sync + 'static {
    /// Backend-specific transaction handle.
    type Handle: Send + Sync + 'static;

    /// Backend family label used in logs and metrics.
    fn kind(&self) -> &'static str;

    /// Open a transaction, honouring `config.read_only` where supported.
    async fn begin(&self, config: &TxConfig) -> Result<Self::Handle, BackendError>;

    /// Make the handle's effects durable.
    ///
    /// A failed commit is followed by `rollback` on the same handle. If the
    /// backend already discarded the handle it answers that rollback with
    /// `BackendError::TransactionFinished`.
    async fn commit(&self, handle: &Self::Handle) -> Result<(), BackendError>;

    /// Discard the handle's effects.
    async fn rollback(&self, handle: &Self::Handle) -> Result<(), BackendError>;
}

/// Resolves the physical connection for a scope.
pub trait ConnectionProvider<C: ?Sized>: Send + Sync {
    /// Connection the current operation should use.
    fn current_connection(&self, scope: &Scope) -> Result<Arc<C>, TxError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// What happened to a mock handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockAction {
    /// Handle opened.
    Begin,
    /// Handle committed.
    Commit,
    /// Handle rolled back.
    Rollback,
}

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockEvent {
    /// Name of the mock backend.
    pub backend: String,
    /// Call made.
    pub action: MockAction,
    /// Handle the call applied to.
    pub handle: u64,
}

/// Shared, ordered log of mock backend calls.
pub type MockEventLog = Arc<Mutex<Vec<MockEvent>>>;

/// Handle issued by [`MockBackend`].
#[derive(Debug)]
pub struct MockHandle {
    /// Sequence number of the handle.
    pub id: u64,
    /// Whether it was opened read-only.
    pub read_only: bool,
}

/// Backend that records every call, for testing.
pub struct MockBackend {
    name: String,
    log: MockEventLog,
    next_id: AtomicU64,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
}

impl MockBackend {
    /// Mock with its own event log.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_log(name, MockEventLog::default())
    }

    /// Mock writing into a shared event log.
    pub fn with_log(name: impl Into<String>, log: MockEventLog) -> Self {
        Self {
            name: name.into(),
            log,
            next_id: AtomicU64::new(1),
            fail_begin: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// Fail the next `begin`.
    pub fn fail_next_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    /// Fail the next `commit`.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<MockEvent> {
        self.log.lock().clone()
    }

    /// Number of recorded calls of `action` on this backend.
    pub fn count(&self, action: MockAction) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|e| e.backend == self.name && e.action == action)
            .count()
    }

    fn record(&self, action: MockAction, handle: u64) {
        self.log.lock().push(MockEvent {
            backend: self.name.clone(),
            action,
            handle,
        });
    }
}

#[async_trait]
impl TxBackend for MockBackend {
    type Handle = MockHandle;

    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn begin(&self, config: &TxConfig) -> Result<MockHandle, BackendError> {
        if self.fail_begin.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected("begin".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(MockAction::Begin, id);
        Ok(MockHandle {
            id,
            read_only: config.read_only,
        })
    }

    async fn commit(&self, handle: &MockHandle) -> Result<(), BackendError> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected("commit".to_string()));
        }
        self.record(MockAction::Commit, handle.id);
        Ok(())
    }

    async fn rollback(&self, handle: &MockHandle) -> Result<(), BackendError> {
        self.record(MockAction::Rollback, handle.id);
        Ok(())
    }
}
