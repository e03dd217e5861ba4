//! Reader / writer pair for the key-value backend.
//!
//! The reader always talks to the store. The writer queues into the active
//! pipeline when one is bound, so inside a transaction neither the reader nor
//! the writer observes a queued write until the pipeline executes.

use super::{KvCommand, KvPipeline, KvStore};
use std::sync::Arc;
use tx_core::{
    BackendError, Client, ClientProvider, ConnectionProvider, DefaultClientProvider, Scope,
    TxError, TxIdentity,
};

/// Result of a writer command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
    /// Executed immediately.
    Value(T),
    /// Queued in a pipeline; no value until it executes.
    Queued,
}

impl<T> Reply<T> {
    /// Executed value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Queued => None,
        }
    }
}

/// Write side of a key-value client.
#[derive(Clone, Debug)]
pub enum KvWriter {
    /// No transaction: commands run against the store.
    Direct(Arc<KvStore>),
    /// Inside a transaction: commands are queued.
    Pipelined(Arc<KvPipeline>),
}

impl KvWriter {
    /// Set `key` to `value`.
    pub fn set(&self, key: &str, value: &str) -> Result<Reply<Option<String>>, BackendError> {
        match self {
            Self::Direct(store) => Ok(Reply::Value(store.set(key, value))),
            Self::Pipelined(pipeline) => pipeline
                .enqueue(KvCommand::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .map(|()| Reply::Queued),
        }
    }

    /// Remove `key`.
    pub fn del(&self, key: &str) -> Result<Reply<bool>, BackendError> {
        match self {
            Self::Direct(store) => Ok(Reply::Value(store.del(key))),
            Self::Pipelined(pipeline) => pipeline
                .enqueue(KvCommand::Del {
                    key: key.to_string(),
                })
                .map(|()| Reply::Queued),
        }
    }

    /// Read `key` through the writer.
    pub fn get(&self, key: &str) -> Reply<Option<String>> {
        match self {
            Self::Direct(store) => Reply::Value(store.get(key)),
            Self::Pipelined(_) => Reply::Queued,
        }
    }

    /// True when commands are being queued.
    pub fn is_pipelined(&self) -> bool {
        matches!(self, Self::Pipelined(_))
    }
}

/// Resolves `(reader, writer)` pairs for one transactor identity.
pub struct KvClientProvider {
    inner: DefaultClientProvider<KvStore>,
}

impl KvClientProvider {
    /// Provider matching a transactor built with the same arguments.
    pub fn new(identity: TxIdentity, connections: Arc<dyn ConnectionProvider<KvStore>>) -> Self {
        Self {
            inner: DefaultClientProvider::new(identity, connections),
        }
    }

    /// Reader and writer for `scope`.
    pub fn current_client(&self, scope: &Scope) -> Result<(Arc<KvStore>, KvWriter), TxError> {
        Ok(match self.inner.current_client(scope)? {
            Client::Transactional { connection, handle } => {
                (connection, KvWriter::Pipelined(handle))
            }
            Client::Direct(connection) => {
                let writer = KvWriter::Direct(Arc::clone(&connection));
                (connection, writer)
            }
        })
    }
}
