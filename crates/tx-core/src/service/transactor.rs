//! # Backend Transactor
//!
//! Required / RequiresNew propagation over a single backend identity.
//!
//! ## Lifecycle
//!
//! ```text
//! resolve identity ─► resolve connection ─► begin ─► body ─┬─► commit
//!                                                          ├─► rollback (error, rollback-only)
//!                                                          ├─► rollback + resume panic
//!                                                          └─► rollback on drop (cancelled)
//! ```

use super::guard::TxGuard;
use crate::domain::{
    BackendId, Propagation, RollbackReason, RoutingError, Scope, TxConfig, TxError, TxIdentity,
    TxOption,
};
use crate::ports::{ConnectionProvider, Transactor, TxBackend, UnitOfWork};
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};
use tx_telemetry::metrics;

/// Transactor for one backend family.
///
/// The handle it opens is bound in the scope under its identity, so nested
/// `required` calls with the same identity join instead of opening a second
/// handle.
pub struct BackendTransactor<C: TxBackend> {
    identity: TxIdentity,
    connections: Arc<dyn ConnectionProvider<C>>,
}

impl<C: TxBackend> BackendTransactor<C> {
    /// Create a transactor over `connections`, bound under `identity`.
    pub fn new(identity: TxIdentity, connections: Arc<dyn ConnectionProvider<C>>) -> Self {
        Self {
            identity,
            connections,
        }
    }

    /// Identity the handle is bound under.
    pub fn identity(&self) -> &TxIdentity {
        &self.identity
    }

    async fn run(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
        propagation: Propagation,
    ) -> Result<(), TxError> {
        let backend = self.resolve_identity(scope)?;
        let key = TxIdentity::handle_key::<C::Handle>(&backend);

        if propagation == Propagation::Required && scope.contains(&key) {
            metrics::record_join(self.identity.group());
            debug!(backend = %backend, "[tx-core] Joining active transaction");
            return work(scope.clone()).await;
        }

        let connection = self.resolve_connection(scope, &backend)?;
        let config = TxConfig::from_options(options);
        let guard = TxGuard::begin(connection, backend, &config).await?;
        let inner = scope.with_shared(&key, guard.handle());

        let outcome = AssertUnwindSafe(async move { work(inner).await })
            .catch_unwind()
            .await;

        match outcome {
            Err(payload) => {
                guard.rollback(RollbackReason::Panic).await;
                panic::resume_unwind(payload)
            }
            Ok(Err(err)) => {
                guard.rollback(RollbackReason::BodyError).await;
                Err(err)
            }
            Ok(Ok(())) if config.rollback_only => {
                guard.rollback(RollbackReason::RollbackOnly).await;
                Ok(())
            }
            Ok(Ok(())) => guard.commit().await,
        }
    }

    fn resolve_identity(&self, scope: &Scope) -> Result<BackendId, TxError> {
        self.identity.resolve(scope).map_err(|e| {
            self.routing_failure(&e);
            TxError::Routing(e)
        })
    }

    fn resolve_connection(&self, scope: &Scope, backend: &BackendId) -> Result<Arc<C>, TxError> {
        self.connections.current_connection(scope).map_err(|e| {
            if let TxError::Routing(routing) = &e {
                self.routing_failure(routing);
            } else {
                error!(backend = %backend, error = %e, "[tx-core] No connection available");
            }
            e
        })
    }

    fn routing_failure(&self, e: &RoutingError) {
        metrics::record_failure(self.identity.group(), "routing");
        error!(group = self.identity.group(), error = %e, "[tx-core] Routing failed");
    }
}

#[async_trait]
impl<C: TxBackend> Transactor for BackendTransactor<C> {
    async fn required(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError> {
        self.run(scope, work, options, Propagation::Required).await
    }

    async fn requires_new(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError> {
        self.run(scope, work, options, Propagation::RequiresNew).await
    }
}

impl<C: TxBackend> fmt::Debug for BackendTransactor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTransactor")
            .field("identity", &self.identity)
            .finish()
    }
}
