//! # Service Layer
//!
//! Transactors built on the domain and ports layers.

mod composite;
mod guard;
mod transactor;

pub use composite::CompositeTransactor;
pub use transactor::BackendTransactor;
