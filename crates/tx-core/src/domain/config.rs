//! # Options and Configuration
//!
//! `TxOption` values are applied in call order onto a fresh `TxConfig` for
//! every invocation; a later option wins on the field it sets.
//!
//! `RouterConfig` carries the hash-slot parameters for sharding providers.

use crate::algorithms::hash_slot::DEFAULT_MAX_SLOT;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::env;
use std::fmt;
use std::sync::Arc;

/// Backend-specific option value.
#[derive(Clone)]
pub struct VendorOption {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl VendorOption {
    /// Wrap a vendor value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }
}

impl fmt::Debug for VendorOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A single option passed to `required` / `requires_new`.
#[derive(Clone, Debug)]
pub enum TxOption {
    /// Request a backend-native read-only transaction.
    ReadOnly(bool),
    /// Discard the effects of a successful unit of work.
    RollbackOnly(bool),
    /// Pass-through parameter for one backend.
    Vendor(VendorOption),
}

impl TxOption {
    /// Read-only transaction.
    pub fn read_only() -> Self {
        Self::ReadOnly(true)
    }

    /// Rollback-only transaction.
    pub fn rollback_only() -> Self {
        Self::RollbackOnly(true)
    }

    /// Backend-specific option; backends ignore types they do not know.
    pub fn vendor<T: Any + Send + Sync>(value: T) -> Self {
        Self::Vendor(VendorOption::new(value))
    }
}

/// Effective configuration of one invocation.
#[derive(Clone, Debug, Default)]
pub struct TxConfig {
    /// Open a read-only transaction where the backend supports it.
    pub read_only: bool,
    /// Roll back even when the body succeeds.
    pub rollback_only: bool,
    vendor: Vec<VendorOption>,
}

impl TxConfig {
    /// Build the configuration from options, in order.
    pub fn from_options(options: &[TxOption]) -> Self {
        let mut config = Self::default();
        for option in options {
            config.apply(option);
        }
        config
    }

    /// Apply one option.
    pub fn apply(&mut self, option: &TxOption) {
        match option {
            TxOption::ReadOnly(flag) => self.read_only = *flag,
            TxOption::RollbackOnly(flag) => self.rollback_only = *flag,
            TxOption::Vendor(value) => {
                self.vendor.retain(|v| v.type_id != value.type_id);
                self.vendor.push(value.clone());
            }
        }
    }

    /// Vendor option of type `T`, if one was given.
    pub fn vendor<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.vendor
            .iter()
            .find(|v| v.type_id == TypeId::of::<T>())
            .and_then(|v| v.value.downcast_ref::<T>())
    }
}

/// Hash-slot routing parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Upper bound of the hash-slot space (default: 16383).
    pub max_slot: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_slot: DEFAULT_MAX_SLOT,
        }
    }
}

impl RouterConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `TX_MAX_SLOT`, falling back to the default when unset or invalid.
    pub fn from_env() -> Self {
        let max_slot = env::var("TX_MAX_SLOT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &u32| *v > 0)
            .unwrap_or(DEFAULT_MAX_SLOT);
        Self { max_slot }
    }

    /// Set the upper bound of the hash-slot space.
    pub fn with_max_slot(mut self, max_slot: u32) -> Self {
        self.max_slot = max_slot;
        self
    }
}
