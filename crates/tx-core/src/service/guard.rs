//! # Transaction Guard
//!
//! Owns one open handle and releases it exactly once. The explicit paths are
//! `commit` and `rollback`; if the owning future is dropped first, `Drop`
//! schedules the rollback on the ambient tokio runtime.

use crate::domain::{BackendError, BackendId, RollbackReason, TxConfig, TxError, TxState};
use crate::ports::TxBackend;
use std::sync::Arc;
use tracing::{debug, warn};
use tx_telemetry::metrics;

/// Open transaction on one backend connection.
pub(crate) struct TxGuard<C: TxBackend> {
    connection: Arc<C>,
    handle: Arc<C::Handle>,
    backend: BackendId,
    state: TxState,
}

impl<C: TxBackend> TxGuard<C> {
    /// Open a handle on `connection`.
    pub(crate) async fn begin(
        connection: Arc<C>,
        backend: BackendId,
        config: &TxConfig,
    ) -> Result<Self, TxError> {
        let kind = connection.kind();
        match connection.begin(config).await {
            Ok(handle) => {
                metrics::record_begin(kind);
                debug!(
                    backend = %backend,
                    read_only = config.read_only,
                    "[tx-core] Transaction begun"
                );
                Ok(Self {
                    connection,
                    handle: Arc::new(handle),
                    backend,
                    state: TxState::ActiveTransaction,
                })
            }
            Err(source) => {
                metrics::record_failure(kind, "begin");
                warn!(backend = %backend, error = %source, "[tx-core] Begin failed");
                Err(TxError::Begin { backend, source })
            }
        }
    }

    /// Shared pointer to the open handle.
    pub(crate) fn handle(&self) -> Arc<C::Handle> {
        Arc::clone(&self.handle)
    }

    /// Make the transaction durable.
    ///
    /// A failed commit is followed by a rollback so the handle is released
    /// whatever the backend did with it.
    pub(crate) async fn commit(mut self) -> Result<(), TxError> {
        let kind = self.connection.kind();
        self.transition(TxState::Releasing);
        match self.connection.commit(&self.handle).await {
            Ok(()) => {
                self.transition(TxState::Committed);
                metrics::record_commit(kind);
                debug!(backend = %self.backend, "[tx-core] Transaction committed");
                Ok(())
            }
            Err(source) => {
                metrics::record_failure(kind, "commit");
                warn!(backend = %self.backend, error = %source, "[tx-core] Commit failed");
                release(
                    self.connection.as_ref(),
                    &self.handle,
                    &self.backend,
                    RollbackReason::CommitFailed,
                )
                .await;
                self.transition(TxState::RolledBack);
                Err(TxError::Commit {
                    backend: self.backend.clone(),
                    source,
                })
            }
        }
    }

    /// Discard the transaction. Failures are logged only.
    pub(crate) async fn rollback(mut self, reason: RollbackReason) {
        self.transition(TxState::Releasing);
        release(self.connection.as_ref(), &self.handle, &self.backend, reason).await;
        self.transition(TxState::RolledBack);
    }

    fn transition(&mut self, next: TxState) {
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
    }
}

impl<C: TxBackend> Drop for TxGuard<C> {
    fn drop(&mut self) {
        match self.state {
            TxState::ActiveTransaction => {}
            TxState::Releasing => {
                // The in-flight commit or rollback owns the handle.
                debug!(backend = %self.backend, "[tx-core] Unit of work cancelled during release");
                return;
            }
            _ => return,
        }
        self.state = TxState::RolledBack;

        let connection = Arc::clone(&self.connection);
        let handle = Arc::clone(&self.handle);
        let backend = self.backend.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(backend = %backend, "[tx-core] Unit of work cancelled, scheduling rollback");
                runtime.spawn(async move {
                    release(connection.as_ref(), &handle, &backend, RollbackReason::Cancelled)
                        .await;
                });
            }
            Err(_) => {
                metrics::record_failure(connection.kind(), "rollback");
                warn!(
                    backend = %backend,
                    "[tx-core] Transaction dropped outside a runtime, handle leaked"
                );
            }
        }
    }
}

async fn release<C: TxBackend>(
    connection: &C,
    handle: &C::Handle,
    backend: &BackendId,
    reason: RollbackReason,
) {
    let kind = connection.kind();
    match connection.rollback(handle).await {
        Ok(()) => {
            metrics::record_rollback(kind, reason.as_str());
            debug!(
                backend = %backend,
                reason = reason.as_str(),
                "[tx-core] Transaction rolled back"
            );
        }
        Err(BackendError::TransactionFinished(_)) if reason == RollbackReason::CommitFailed => {
            // The backend already discarded the handle when commit failed.
            debug!(backend = %backend, "[tx-core] Handle finished by failed commit");
        }
        Err(e) => {
            metrics::record_failure(kind, "rollback");
            warn!(
                backend = %backend,
                reason = reason.as_str(),
                error = %e,
                "[tx-core] Rollback failed"
            );
        }
    }
}
