//! # Connection and Client Providers
//!
//! Implements the `ConnectionProvider` and `ClientProvider` ports.
//!
//! - [`DefaultConnectionProvider`]: one fixed connection
//! - [`ShardingConnectionProvider`]: hash-slot routing over a connection pool
//! - [`DefaultClientProvider`]: active handle when bound, raw connection otherwise

use crate::algorithms::HashSlotPartition;
use crate::domain::{
    invariant_index_in_range, RouterConfig, RoutingError, Scope, ShardKeyFn, TxError, TxIdentity,
};
use crate::ports::{Client, ClientProvider, ConnectionProvider, TxBackend};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Always returns the same connection.
pub struct DefaultConnectionProvider<C: ?Sized> {
    connection: Arc<C>,
}

impl<C: ?Sized> DefaultConnectionProvider<C> {
    /// Provider for `connection`.
    pub fn new(connection: Arc<C>) -> Self {
        Self { connection }
    }
}

impl<C: ?Sized + Send + Sync> ConnectionProvider<C> for DefaultConnectionProvider<C> {
    fn current_connection(&self, _scope: &Scope) -> Result<Arc<C>, TxError> {
        Ok(Arc::clone(&self.connection))
    }
}

/// Routes each scope to the connection owning its shard key's hash slot.
///
/// The pool and its partition are fixed at construction and shared freely
/// between tasks.
pub struct ShardingConnectionProvider<C: ?Sized> {
    connections: Vec<Arc<C>>,
    partition: HashSlotPartition,
    shard_key: ShardKeyFn,
}

impl<C: ?Sized> ShardingConnectionProvider<C> {
    /// Partition `max_slot` slots across `connections`.
    pub fn new(
        connections: Vec<Arc<C>>,
        max_slot: u32,
        shard_key: ShardKeyFn,
    ) -> Result<Self, RoutingError> {
        let partition = HashSlotPartition::new(connections.len(), max_slot)?;
        debug!(
            connections = connections.len(),
            max_slot,
            boundaries = ?partition.boundaries(),
            "[tx-core] Sharding pool partitioned"
        );
        Ok(Self {
            connections,
            partition,
            shard_key,
        })
    }

    /// Partition using the router configuration.
    pub fn from_config(
        connections: Vec<Arc<C>>,
        config: &RouterConfig,
        shard_key: ShardKeyFn,
    ) -> Result<Self, RoutingError> {
        Self::new(connections, config.max_slot, shard_key)
    }

    /// Partition in use.
    pub fn partition(&self) -> &HashSlotPartition {
        &self.partition
    }

    /// Connection owning `shard_key`.
    pub fn connection_for(&self, shard_key: &str) -> Result<Arc<C>, RoutingError> {
        let index = self.partition.resolve(shard_key.as_bytes())?;
        invariant_index_in_range(index, self.connections.len())?;
        trace!(shard_key, index, "[tx-core] Shard key routed");
        Ok(Arc::clone(&self.connections[index]))
    }
}

impl<C: ?Sized + Send + Sync> ConnectionProvider<C> for ShardingConnectionProvider<C> {
    fn current_connection(&self, scope: &Scope) -> Result<Arc<C>, TxError> {
        let shard_key = (self.shard_key)(scope)?;
        Ok(self.connection_for(&shard_key)?)
    }
}

impl<C: ?Sized> fmt::Debug for ShardingConnectionProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardingConnectionProvider")
            .field("connections", &self.connections.len())
            .field("partition", &self.partition)
            .finish()
    }
}

/// Resolves the client for a transactor identity.
///
/// Must be built with the same identity and connection provider as the
/// transactor whose handle it looks up.
pub struct DefaultClientProvider<C: TxBackend> {
    identity: TxIdentity,
    connections: Arc<dyn ConnectionProvider<C>>,
}

impl<C: TxBackend> DefaultClientProvider<C> {
    /// Provider looking up handles bound under `identity`.
    pub fn new(identity: TxIdentity, connections: Arc<dyn ConnectionProvider<C>>) -> Self {
        Self {
            identity,
            connections,
        }
    }
}

impl<C: TxBackend> ClientProvider<C> for DefaultClientProvider<C> {
    fn current_client(&self, scope: &Scope) -> Result<Client<C>, TxError> {
        let backend = self.identity.resolve(scope)?;
        let connection = self.connections.current_connection(scope)?;
        let key = TxIdentity::handle_key::<C::Handle>(&backend);
        Ok(match scope.get_shared(&key) {
            Some(handle) => Client::Transactional { connection, handle },
            None => Client::Direct(connection),
        })
    }
}
