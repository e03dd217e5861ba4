//! # Inbound Ports
//!
//! What application code calls: transactors and client providers.

use super::outbound::TxBackend;
use crate::domain::{Scope, TxError, TxOption};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A unit of work run inside a transaction.
///
/// Receives the scope carrying the active transaction handles.
pub type UnitOfWork = Box<dyn FnOnce(Scope) -> BoxFuture<'static, Result<(), TxError>> + Send>;

/// Box an async closure into a [`UnitOfWork`].
pub fn unit_of_work<F, Fut>(f: F) -> UnitOfWork
where
    F: FnOnce(Scope) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TxError>> + Send + 'static,
{
    Box::new(move |scope| Box::pin(f(scope)))
}

/// Transaction propagation API - inbound port.
#[async_trait]
pub trait Transactor: Send + Sync {
    /// Join the active transaction, or begin one if none exists.
    async fn required(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError>;

    /// Begin a new transaction, suspending the active one if it exists.
    async fn requires_new(
        &self,
        scope: &Scope,
        work: UnitOfWork,
        options: &[TxOption],
    ) -> Result<(), TxError>;
}

/// Typed variants of [`Transactor`] that return the body's own value and error.
///
/// The body's error is handed back exactly as returned; engine failures
/// (begin, commit, routing) are converted with `E::from`.
#[async_trait]
pub trait TransactorExt: Transactor {
    /// Typed [`Transactor::required`].
    async fn required_with<T, E, F, Fut>(
        &self,
        scope: &Scope,
        options: &[TxOption],
        body: F,
    ) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<TxError> + Send + 'static,
        F: FnOnce(Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (work, outcome) = capture(body);
        let result = self.required(scope, work, options).await;
        outcome.into_result(result)
    }

    /// Typed [`Transactor::requires_new`].
    async fn requires_new_with<T, E, F, Fut>(
        &self,
        scope: &Scope,
        options: &[TxOption],
        body: F,
    ) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<TxError> + Send + 'static,
        F: FnOnce(Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (work, outcome) = capture(body);
        let result = self.requires_new(scope, work, options).await;
        outcome.into_result(result)
    }
}

impl<X: Transactor + ?Sized> TransactorExt for X {}

struct Outcome<T, E>(Arc<Mutex<Option<Result<T, E>>>>);

impl<T, E: From<TxError>> Outcome<T, E> {
    fn into_result(self, result: Result<(), TxError>) -> Result<T, E> {
        let captured = self.0.lock().take();
        match (captured, result) {
            (Some(Err(err)), _) => Err(err),
            (Some(Ok(value)), Ok(())) => Ok(value),
            (_, Err(err)) => Err(E::from(err)),
            (None, Ok(())) => Err(E::from(TxError::MissingOutcome)),
        }
    }
}

fn capture<T, E, F, Fut>(body: F) -> (UnitOfWork, Outcome<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Scope) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let slot = Arc::new(Mutex::new(None));
    let writer = Arc::clone(&slot);
    let work = unit_of_work(move |scope| async move {
        let result = body(scope).await;
        let failed = result.is_err();
        *writer.lock() = Some(result);
        if failed {
            Err(TxError::BodyFailed)
        } else {
            Ok(())
        }
    });
    (work, Outcome(slot))
}

/// What a call site should execute against.
pub enum Client<C: TxBackend> {
    /// A transaction is active for the identity.
    Transactional {
        /// Connection the transaction was opened on.
        connection: Arc<C>,
        /// Active handle.
        handle: Arc<C::Handle>,
    },
    /// No transaction; use the connection directly.
    Direct(Arc<C>),
}

impl<C: TxBackend> Client<C> {
    /// Underlying connection.
    pub fn connection(&self) -> &Arc<C> {
        match self {
            Self::Transactional { connection, .. } => connection,
            Self::Direct(connection) => connection,
        }
    }

    /// Active handle, if any.
    pub fn handle(&self) -> Option<&Arc<C::Handle>> {
        match self {
            Self::Transactional { handle, .. } => Some(handle),
            Self::Direct(_) => None,
        }
    }

    /// True inside a transaction.
    pub fn in_transaction(&self) -> bool {
        matches!(self, Self::Transactional { .. })
    }
}

impl<C: TxBackend> Clone for Client<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Transactional { connection, handle } => Self::Transactional {
                connection: Arc::clone(connection),
                handle: Arc::clone(handle),
            },
            Self::Direct(connection) => Self::Direct(Arc::clone(connection)),
        }
    }
}

impl<C: TxBackend> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transactional { connection, .. } => {
                write!(f, "Client::Transactional({})", connection.kind())
            }
            Self::Direct(connection) => write!(f, "Client::Direct({})", connection.kind()),
        }
    }
}

/// Resolves the client for a scope.
pub trait ClientProvider<C: TxBackend>: Send + Sync {
    /// The active transaction handle when one is bound, the raw connection otherwise.
    fn current_client(&self, scope: &Scope) -> Result<Client<C>, TxError>;
}
