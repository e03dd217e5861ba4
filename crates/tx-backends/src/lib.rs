//! # tx-backends
//!
//! In-memory reference backends for `tx-core`.
//!
//! | Module | Handle | Read-only support |
//! |--------|--------|-------------------|
//! | `rdbms` | staged SQL transaction | writes rejected at the write attempt |
//! | `kv` | MULTI/EXEC pipeline | ignored |
//! | `distsql` | read-write / read-only transaction | read-only snapshot, stale reads |
//!
//! Each backend pairs its connection type (the `TxBackend`) with a client
//! provider that hands call sites the active transaction when one is bound.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distsql;
pub mod kv;
pub mod rdbms;

pub use distsql::{DistClient, DistClientProvider, DistDatabase, DistTransaction};
pub use kv::{KvClientProvider, KvPipeline, KvStore, KvWriter};
pub use rdbms::{SqlClient, SqlClientProvider, SqlDatabase, SqlTransaction};
