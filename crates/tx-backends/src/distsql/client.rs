//! Call-site facade for the distributed SQL backend.

use super::{DistDatabase, Mutation, Row, Statement, TxMode};
use std::sync::Arc;
use tx_core::{
    BackendError, Client, ClientProvider, ConnectionProvider, DefaultClientProvider, Scope,
    TxError, TxIdentity,
};

/// Routes reads and writes to the active transaction or the database.
#[derive(Clone, Debug)]
pub struct DistClient {
    inner: Client<DistDatabase>,
}

impl DistClient {
    /// Wrap a resolved client.
    pub fn new(inner: Client<DistDatabase>) -> Self {
        Self { inner }
    }

    /// Mode of the active transaction, if any.
    pub fn mode(&self) -> Option<TxMode> {
        self.inner.handle().map(|tx| tx.mode())
    }

    /// Buffer the mutations in a read-write transaction, apply them directly
    /// outside one. Rejected in a read-only transaction.
    pub fn apply_or_buffer_write(&self, mutations: Vec<Mutation>) -> Result<(), BackendError> {
        match &self.inner {
            Client::Transactional { handle, .. } => handle.push(mutations, false),
            Client::Direct(db) => {
                db.apply(&mutations);
                Ok(())
            }
        }
    }

    /// Run DML inside the read-write transaction, returning the affected row count.
    pub fn update(&self, statement: &Statement) -> Result<usize, BackendError> {
        match &self.inner {
            Client::Transactional { connection, handle } => connection.update_in(handle, statement),
            Client::Direct(_) => Err(BackendError::TransactionRequired(format!("{statement:?}"))),
        }
    }

    /// Run several DML statements in order.
    pub fn batch_update(&self, statements: &[Statement]) -> Result<Vec<usize>, BackendError> {
        statements.iter().map(|s| self.update(s)).collect()
    }

    /// Run DML outside any read-write transaction.
    pub fn partitioned_update(&self, statement: &Statement) -> Result<usize, BackendError> {
        if self.mode() == Some(TxMode::ReadWrite) {
            return Err(BackendError::Unsupported(
                "partitioned update inside read write transaction".to_string(),
            ));
        }
        Ok(self.inner.connection().partitioned_update(statement))
    }

    /// Row under `key`.
    pub fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>, BackendError> {
        match &self.inner {
            Client::Transactional { connection, handle } => {
                connection.read_row_in(handle, table, key)
            }
            Client::Direct(db) => Ok(db.read_row(table, key)),
        }
    }

    /// Every row of `table`, ordered by key.
    pub fn read_all(&self, table: &str) -> Result<Vec<(String, Row)>, BackendError> {
        match &self.inner {
            Client::Transactional { connection, handle } => connection.read_all_in(handle, table),
            Client::Direct(db) => Ok(db.read_all(table)),
        }
    }
}

/// Resolves [`DistClient`]s for one transactor identity.
pub struct DistClientProvider {
    inner: DefaultClientProvider<DistDatabase>,
}

impl DistClientProvider {
    /// Provider matching a transactor built with the same arguments.
    pub fn new(identity: TxIdentity, connections: Arc<dyn ConnectionProvider<DistDatabase>>) -> Self {
        Self {
            inner: DefaultClientProvider::new(identity, connections),
        }
    }

    /// Client for `scope`.
    pub fn current_client(&self, scope: &Scope) -> Result<DistClient, TxError> {
        self.inner.current_client(scope).map(DistClient::new)
    }
}
