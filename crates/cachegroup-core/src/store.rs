//! The store abstraction (spec §4.2 / §4.5): a typed key/value backend, namespaced by
//! group, that the group engine reads through and writes through.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ConfigurationError, StoreError};

/// Type-erased value as carried across the store boundary. `Arc` rather than `Box` so a
/// store can hand back a cached value without needing `V` itself to support cheap
/// duplication any other way — the engine downcasts and clones the inner `V` once, on
/// the way out.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

/// Per-group hints given to a store at registration time. A store that cannot honor a
/// non-zero field must fail `configure_group` rather than silently ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupConfig {
    pub ttl: Duration,
    pub cost: u64,
}

/// Opaque composite key passed to stores. `store_key` is the string projection of the
/// engine's key type (see [`crate::key::CacheKey`]); the store is free to re-hash or
/// otherwise reshape it internally as long as `Key` stays deterministic and namespaced
/// by `group_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub group_name: String,
    pub store_key: String,
}

/// A typed key/value backend. Values cross the boundary type-erased (as in the original
/// Go `Store` interface, which carries `any`); the group engine downcasts back to `V` on
/// the way out, so a single concrete store can back groups of unrelated value types — the
/// same property that lets one store serve as the process-wide default (§3's "Default
/// Store").
#[async_trait]
pub trait Store: Send + Sync {
    /// Called exactly once per group per store, before any other call referring to that
    /// group.
    async fn configure_group(
        &self,
        name: &str,
        config: &GroupConfig,
    ) -> Result<(), ConfigurationError>;

    /// Pure, deterministic projection of `(group, key)` into the composite the store
    /// understands. Must namespace by `group`.
    fn key(&self, group: &str, key: &str) -> GroupKey;

    /// Returns `Err(StoreError::NotFound)` on a clean miss. Any other error is treated by
    /// the engine as fatal for this call — it does not fall through to the loader.
    async fn get(&self, key: &GroupKey) -> Result<StoredValue, StoreError>;

    /// Writes. A store that drops the entry (e.g. admission control) must still return
    /// `Ok(())`; only a genuine failure is an `Err`.
    async fn set(&self, key: &GroupKey, value: StoredValue) -> Result<(), StoreError>;

    /// Idempotent: removing a nonexistent key is not an error.
    async fn del(&self, key: &GroupKey) -> Result<(), StoreError>;
}

pub(crate) fn erase<V: Send + Sync + 'static>(value: V) -> StoredValue {
    Arc::new(value)
}

pub(crate) fn downcast<V: Clone + Send + Sync + 'static>(value: StoredValue) -> Result<V, StoreError> {
    value.downcast::<V>().map(|v| (*v).clone()).map_err(|_| {
        StoreError::backend(anyhow::anyhow!(
            "store returned a value of an unexpected type"
        ))
    })
}
