//! # Ports Layer
//!
//! - `inbound`: `Transactor`, `TransactorExt`, `ClientProvider`
//! - `outbound`: `TxBackend`, `ConnectionProvider`

pub mod inbound;
pub mod outbound;

pub use inbound::{unit_of_work, Client, ClientProvider, Transactor, TransactorExt, UnitOfWork};
pub use outbound::{
    ConnectionProvider, MockAction, MockBackend, MockEvent, MockEventLog, MockHandle, TxBackend,
};
