//! # tx-core
//!
//! Backend-agnostic transaction propagation.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Run a unit of work inside a transaction on one or more storage backends:
//! - `Required` joins the transaction already bound in the scope, or begins one
//! - `RequiresNew` always begins a new transaction, shadowing the outer one
//! - `CompositeTransactor` spans several backends (not atomically)
//! - CRC32 hash-slot routing picks the connection owning a shard key
//!
//! ## Release Guarantees
//!
//! | Exit path | Outcome |
//! |-----------|---------|
//! | Body succeeds | Commit (rollback under `rollback_only`) |
//! | Body returns an error | Rollback, error returned unchanged |
//! | Body panics | Rollback, panic resumed |
//! | Future dropped | Rollback scheduled on the runtime |
//!
//! ## Module Structure
//!
//! ```text
//! tx-core/
//! ├── domain/          # Scope, options, identities, errors
//! ├── algorithms/      # Hash-slot partitioning
//! ├── ports/           # Transactor, TxBackend, providers
//! ├── adapters/        # Default and sharding providers
//! └── service/         # BackendTransactor, CompositeTransactor
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{DefaultClientProvider, DefaultConnectionProvider, ShardingConnectionProvider};
pub use algorithms::{build_partition, hash_slot, resolve, HashSlotPartition, DEFAULT_MAX_SLOT};
pub use domain::{
    invariant_deterministic_resolution, invariant_index_in_range,
    invariant_partition_covers_space, shard_key_from, BackendError, BackendId, Propagation,
    RollbackReason, RouterConfig, RoutingError, Scope, ScopeKey, ShardKeyFn, TxConfig, TxError,
    TxIdentity, TxOption, TxState, VendorOption,
};
pub use ports::{
    unit_of_work, Client, ClientProvider, ConnectionProvider, MockAction, MockBackend, MockEvent,
    MockEventLog, MockHandle, Transactor, TransactorExt, TxBackend, UnitOfWork,
};
pub use service::{BackendTransactor, CompositeTransactor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
