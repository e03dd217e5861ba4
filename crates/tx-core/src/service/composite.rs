//! # Composite Transactor
//!
//! Runs one unit of work inside a transaction on every wrapped backend.
//!
//! The unit of work is wrapped by each transactor in list order, so the first
//! listed transactor sits innermost:
//!
//! ```text
//! [A, B]  ─►  B.required(A.required(body))
//!
//! begin B ─► begin A ─► body ─► commit A ─► commit B
//! ```
//!
//! ## Non-atomicity
//!
//! This is not a distributed commit. If A has committed and B then fails to
//! commit, the caller receives B's error while A's effects remain.

use crate::domain::{Propagation, Scope, TxError, TxOption};
use crate::ports::{unit_of_work, Transactor, UnitOfWork};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Transactor spanning several backends.
#[derive(Clone, Default)]
pub struct CompositeTransactor {
    transactors: Vec<Arc<dyn Transactor>>,
}

impl CompositeTransactor {
    /// Compose `transactors`; the first listed commits first.
    pub fn new(transactors: Vec<Arc<dyn Transactor>>) -> Self {
        Self { transactors }
    }

    /// Add a transactor as the new outermost wrapper.
    pub fn with(mut self, transactor: Arc<dyn Transactor>) -> Self {
        self.transactors.push(transactor);
        self
    }

    /// Number of wrapped transactors.
    pub fn len(&self) -> usize {
        self.transactors.len()
    }

    /// True if no transactor is wrapped.
    pub fn is_empty(&self) -> bool {
        self.transactors.is_empty()
    }

    fn compose(
        &self,
        work: UnitOfWork,
        options: &[TxOption],
        propagation: Propagation,
    ) -> UnitOfWork {
        let options: Arc<[TxOption]> = options.into();
        self.transactors
            .iter()
            .fold(work, |inner, transactor| {
                let transactor = Arc::clone(transactor);
                let options = Arc::clone(&options);
                unit_of_work(move |scope: Scope| async move {
                    match propagation {
                        Propagation::Required => transactor.required(&scope, inner, &options).await,
                        Propagation::RequiresNew => {
                            transactor.requires_new(&scope, inner, &options).await
                        }
                    }
                })
            })
    }
}

#[async_trait]
impl Transactor for CompositeTransactor {
    async fn required(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError> {
        debug!(backends = self.len(), "[tx-core] Composite required");
        self.compose(work, options, Propagation::Required)(scope.clone()).await
    }

    async fn requires_new(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError> {
        debug!(backends = self.len(), "[tx-core] Composite requires_new");
        self.compose(work, options, Propagation::RequiresNew)(scope.clone()).await
    }
}
