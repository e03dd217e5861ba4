//! # Domain Invariants
//!
//! Rules that must always hold for partitions and propagation.

use super::errors::RoutingError;

/// Invariant: a partition routes every slot in `[0, max_slot)`.
///
/// Boundaries are non-decreasing, the last equals `max_slot`, and there is one
/// boundary per connection.
pub fn invariant_partition_covers_space(
    boundaries: &[u32],
    max_slot: u32,
    connections: usize,
) -> Result<(), RoutingError> {
    if boundaries.len() != connections {
        return Err(RoutingError::MalformedPartition(format!(
            "{} boundaries for {} connections",
            boundaries.len(),
            connections
        )));
    }

    if boundaries.windows(2).any(|w| w[0] > w[1]) {
        return Err(RoutingError::MalformedPartition(
            "boundaries are not monotonically non-decreasing".to_string(),
        ));
    }

    match boundaries.last() {
        Some(last) if *last == max_slot => Ok(()),
        Some(last) => Err(RoutingError::MalformedPartition(format!(
            "last boundary {last} does not equal max slot {max_slot}"
        ))),
        None => Err(RoutingError::NoConnections),
    }
}

/// Invariant: shard resolution is deterministic.
///
/// Same key + same partition = same index.
pub fn invariant_deterministic_resolution<F>(resolve_fn: F, shard_key: &[u8]) -> bool
where
    F: Fn(&[u8]) -> Option<usize>,
{
    resolve_fn(shard_key) == resolve_fn(shard_key)
}

/// Invariant: a resolved index addresses an existing connection.
pub fn invariant_index_in_range(index: usize, connections: usize) -> Result<(), RoutingError> {
    if index < connections {
        Ok(())
    } else {
        Err(RoutingError::MalformedPartition(format!(
            "index {index} outside {connections} connections"
        )))
    }
}
