//! # Algorithms
//!
//! - `hash_slot`: hash-slot partitioning and shard-key resolution

pub mod hash_slot;

pub use hash_slot::{build_partition, hash_slot, resolve, HashSlotPartition, DEFAULT_MAX_SLOT};
