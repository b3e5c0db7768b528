//! The reference local map store (spec §4.5): a concurrency-safe, per-group mapping from
//! `store_key` to value. Does not support `ttl` or `cost` — a store that cannot honor a
//! non-zero hint must fail `configure_group` rather than ignore it, so a group requesting
//! either aborts construction.

use dashmap::DashMap;

use async_trait::async_trait;

use crate::error::{ConfigurationError, StoreError};
use crate::store::{GroupConfig, GroupKey, Store, StoredValue};

/// In-process hash map store, namespaced per group so keys cannot collide across groups
/// sharing this store (mirrors the original's one-`sync.Map`-per-group-name design).
#[derive(Default)]
pub struct MemoryStore {
    groups: DashMap<String, DashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn configure_group(
        &self,
        name: &str,
        config: &GroupConfig,
    ) -> Result<(), ConfigurationError> {
        if config.ttl != std::time::Duration::ZERO {
            return Err(ConfigurationError::TtlUnsupported(name.to_string()));
        }
        if config.cost != 0 {
            return Err(ConfigurationError::CostUnsupported(name.to_string()));
        }
        self.groups.entry(name.to_string()).or_default();
        Ok(())
    }

    fn key(&self, group: &str, key: &str) -> GroupKey {
        GroupKey {
            group_name: group.to_string(),
            store_key: key.to_string(),
        }
    }

    async fn get(&self, key: &GroupKey) -> Result<StoredValue, StoreError> {
        let group = self
            .groups
            .get(&key.group_name)
            .ok_or(StoreError::NotFound)?;
        group
            .get(&key.store_key)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &GroupKey, value: StoredValue) -> Result<(), StoreError> {
        let group = self.groups.entry(key.group_name.clone()).or_default();
        group.insert(key.store_key.clone(), value);
        Ok(())
    }

    async fn del(&self, key: &GroupKey) -> Result<(), StoreError> {
        if let Some(group) = self.groups.get(&key.group_name) {
            group.remove(&key.store_key);
        }
        Ok(())
    }
}
