//! # Backend Identity Resolution
//!
//! A transactor and its client provider must agree on the name under which a
//! transaction handle is bound. For a single backend that name is fixed; for
//! a shard group it is qualified by the shard key found in the scope, so
//! `users:user1` and `users:user2` hold independent transactions.

use super::errors::RoutingError;
use super::scope::{Scope, ScopeKey};
use super::value_objects::BackendId;
use std::fmt;
use std::sync::Arc;

/// Extracts a shard key from a scope.
pub type ShardKeyFn = Arc<dyn Fn(&Scope) -> Result<String, RoutingError> + Send + Sync>;

/// Shard key read from a string binding of the scope.
///
/// A missing binding is a routing error, never a default shard.
pub fn shard_key_from(key: ScopeKey<String>) -> ShardKeyFn {
    Arc::new(move |scope: &Scope| {
        scope
            .get(&key)
            .cloned()
            .ok_or_else(|| RoutingError::MissingShardKey(key.name().to_string()))
    })
}

/// How a transactor names its transaction handle for a scope.
#[derive(Clone)]
pub struct TxIdentity {
    group: Arc<str>,
    shard_key: Option<ShardKeyFn>,
}

impl TxIdentity {
    /// Same identity for every scope.
    pub fn fixed(name: impl Into<Arc<str>>) -> Self {
        Self {
            group: name.into(),
            shard_key: None,
        }
    }

    /// Identity qualified by the scope's shard key.
    pub fn sharded(group: impl Into<Arc<str>>, shard_key: ShardKeyFn) -> Self {
        Self {
            group: group.into(),
            shard_key: Some(shard_key),
        }
    }

    /// Group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Identity for `scope`.
    pub fn resolve(&self, scope: &Scope) -> Result<BackendId, RoutingError> {
        match &self.shard_key {
            None => Ok(BackendId::new(Arc::clone(&self.group))),
            Some(extract) => Ok(BackendId::sharded(&self.group, &extract(scope)?)),
        }
    }

    /// Binding key of the handle for `id`.
    pub fn handle_key<H: Send + Sync + 'static>(id: &BackendId) -> ScopeKey<H> {
        ScopeKey::new(id.as_str())
    }
}

impl fmt::Debug for TxIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxIdentity")
            .field("group", &self.group)
            .field("sharded", &self.shard_key.is_some())
            .finish()
    }
}
