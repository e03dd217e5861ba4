//! # Domain Layer
//!
//! Scope, options, identities and errors for transaction propagation.

pub mod config;
pub mod errors;
pub mod identity;
pub mod invariants;
pub mod scope;
pub mod value_objects;

pub use config::*;
pub use errors::*;
pub use identity::*;
pub use invariants::*;
pub use scope::*;
pub use value_objects::*;
