//! Call-site facade over an rdbms connection or its active transaction.

use super::{Row, SqlDatabase, SqlWrite};
use std::sync::Arc;
use tx_core::{
    BackendError, Client, ClientProvider, ConnectionProvider, DefaultClientProvider, Scope,
    TxError, TxIdentity,
};

/// Executes statements inside the active transaction, or in autocommit mode.
#[derive(Clone, Debug)]
pub struct SqlClient {
    inner: Client<SqlDatabase>,
}

impl SqlClient {
    /// Wrap a resolved client.
    pub fn new(inner: Client<SqlDatabase>) -> Self {
        Self { inner }
    }

    /// True inside a transaction.
    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    /// Database this client executes against.
    pub fn database(&self) -> &Arc<SqlDatabase> {
        self.inner.connection()
    }

    /// Insert a row.
    pub fn insert(&self, table: &str, row: Row) -> Result<(), BackendError> {
        match &self.inner {
            Client::Transactional { handle, .. } => handle.stage(SqlWrite::Insert {
                table: table.to_string(),
                row,
            }),
            Client::Direct(db) => {
                db.insert(table, row);
                Ok(())
            }
        }
    }

    /// Every visible row of `table`.
    pub fn select_all(&self, table: &str) -> Result<Vec<Row>, BackendError> {
        match &self.inner {
            Client::Transactional { connection, handle } => connection.select_in(handle, table),
            Client::Direct(db) => Ok(db.select_all(table)),
        }
    }

    /// Number of visible rows in `table`.
    pub fn count(&self, table: &str) -> Result<usize, BackendError> {
        Ok(self.select_all(table)?.len())
    }

    /// Delete every row of `table`, returning how many were visible.
    pub fn delete_all(&self, table: &str) -> Result<usize, BackendError> {
        match &self.inner {
            Client::Transactional { connection, handle } => {
                let visible = connection.select_in(handle, table)?.len();
                handle.stage(SqlWrite::DeleteAll {
                    table: table.to_string(),
                })?;
                Ok(visible)
            }
            Client::Direct(db) => Ok(db.delete_all(table)),
        }
    }
}

impl From<Client<SqlDatabase>> for SqlClient {
    fn from(inner: Client<SqlDatabase>) -> Self {
        Self::new(inner)
    }
}

/// Resolves [`SqlClient`]s for one transactor identity.
pub struct SqlClientProvider {
    inner: DefaultClientProvider<SqlDatabase>,
}

impl SqlClientProvider {
    /// Provider matching a transactor built with the same arguments.
    pub fn new(identity: TxIdentity, connections: Arc<dyn ConnectionProvider<SqlDatabase>>) -> Self {
        Self {
            inner: DefaultClientProvider::new(identity, connections),
        }
    }

    /// Client for `scope`.
    pub fn current_client(&self, scope: &Scope) -> Result<SqlClient, TxError> {
        self.inner.current_client(scope).map(SqlClient::new)
    }
}
