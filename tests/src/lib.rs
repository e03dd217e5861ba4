//! # Transaction Propagation Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── propagation_flows.rs   # Required / RequiresNew on real backends
//! │   ├── composite_flows.rs     # Multi-backend composite runs
//! │   └── sharding_flows.rs      # Hash-slot routed transactors
//! └── benches/
//!     └── routing_benchmarks.rs  # Partition build and shard-key resolution
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tx-tests
//!
//! # By flow
//! cargo test -p tx-tests integration::sharding_flows
//!
//! # Benchmarks
//! cargo bench -p tx-tests
//! ```

#![allow(dead_code)]

pub mod integration;
