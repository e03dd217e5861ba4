//! # Adapters Layer
//!
//! Connection and client provider implementations.

pub mod providers;

pub use providers::{DefaultClientProvider, DefaultConnectionProvider, ShardingConnectionProvider};
