//! # Hash-Slot Routing
//!
//! Deterministic shard routing over a fixed hash-slot space.
//!
//! The space `[0, max_slot]` is cut into one contiguous range per connection.
//! A shard key is hashed with CRC-32 (IEEE), reduced modulo `max_slot`, and
//! routed to the first range whose upper boundary is strictly greater than
//! the slot. Nothing is persisted: the same key always lands on the same
//! index for the same connection count and `max_slot`.

use crate::domain::{invariant_partition_covers_space, RoutingError};

/// Default upper bound of the hash-slot space.
pub const DEFAULT_MAX_SLOT: u32 = 16383;

/// Build the upper boundary of every range.
///
/// Each range spans `max_slot / connection_count` slots (rounded down); the
/// last range absorbs the remainder so the last boundary is exactly
/// `max_slot`.
pub fn build_partition(connection_count: usize, max_slot: u32) -> Result<Vec<u32>, RoutingError> {
    if connection_count == 0 {
        return Err(RoutingError::NoConnections);
    }

    let count = u32::try_from(connection_count).map_err(|_| RoutingError::InvalidPartition {
        connections: connection_count,
        max_slot,
    })?;

    // Every range must own at least one slot.
    if max_slot == 0 || count > max_slot {
        return Err(RoutingError::InvalidPartition {
            connections: connection_count,
            max_slot,
        });
    }

    let average = max_slot / count;
    let last = count - 1;
    let boundaries = (0..count)
        .map(|i| if i == last { max_slot } else { average * (i + 1) })
        .collect();

    Ok(boundaries)
}

/// Slot of a shard key, or `None` when `max_slot` is zero.
pub fn hash_slot(shard_key: &[u8], max_slot: u32) -> Option<u32> {
    crc32fast::hash(shard_key).checked_rem(max_slot)
}

/// Index of the range owning `shard_key`.
///
/// Returns `None` only when `boundaries` cannot cover the slot, which a
/// partition from [`build_partition`] never does.
pub fn resolve(boundaries: &[u32], shard_key: &[u8], max_slot: u32) -> Option<usize> {
    let slot = hash_slot(shard_key, max_slot)?;
    boundaries.iter().position(|boundary| slot < *boundary)
}

/// Validated partition of the hash-slot space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashSlotPartition {
    boundaries: Vec<u32>,
    max_slot: u32,
}

impl HashSlotPartition {
    /// Partition `max_slot` across `connection_count` connections.
    pub fn new(connection_count: usize, max_slot: u32) -> Result<Self, RoutingError> {
        let boundaries = build_partition(connection_count, max_slot)?;
        Self::from_boundaries(boundaries, max_slot)
    }

    /// Adopt explicit boundaries after checking the partition invariants.
    pub fn from_boundaries(boundaries: Vec<u32>, max_slot: u32) -> Result<Self, RoutingError> {
        invariant_partition_covers_space(&boundaries, max_slot, boundaries.len())?;
        if max_slot == 0 {
            return Err(RoutingError::InvalidPartition {
                connections: boundaries.len(),
                max_slot,
            });
        }
        Ok(Self {
            boundaries,
            max_slot,
        })
    }

    /// Index of the connection owning `shard_key`.
    pub fn resolve(&self, shard_key: &[u8]) -> Result<usize, RoutingError> {
        resolve(&self.boundaries, shard_key, self.max_slot).ok_or_else(|| {
            RoutingError::SlotNotFound {
                slot: hash_slot(shard_key, self.max_slot).unwrap_or_default(),
                max_slot: self.max_slot,
            }
        })
    }

    /// Upper boundaries, one per connection.
    pub fn boundaries(&self) -> &[u32] {
        &self.boundaries
    }

    /// Upper bound of the hash-slot space.
    pub fn max_slot(&self) -> u32 {
        self.max_slot
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Always false for a validated partition.
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}
