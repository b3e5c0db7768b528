//! Configuration, validation, and group registry (spec §4's "Factory / builder"): the
//! sole construction path for a [`Group`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;

use crate::broker::Broker;
use crate::error::ConfigurationError;
use crate::group::{subscribe_to_broker, Group, GroupInner, Loader};
use crate::key::CacheKey;
use crate::local_store::MemoryStore;
use crate::registry;
use crate::singleflight::SingleFlight;
use crate::store::{GroupConfig, Store};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// Builder for a [`Group`]. Mirrors the original's `Factory[K, V]` struct and its
/// `With*` fluent setters (spec §6).
pub struct FactoryBuilder<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    name: String,
    loader: Option<Loader<K, V>>,
    store: Option<Arc<dyn Store>>,
    store2: Option<Arc<dyn Store>>,
    broker: Option<Arc<dyn Broker>>,
    suppress_duplicates: bool,
    reload_on_delete: bool,
    ttl: Duration,
    cost: u64,
    debug: bool,
    allow_duplicates: bool,
}

impl<K, V> FactoryBuilder<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            store: None,
            store2: None,
            broker: None,
            suppress_duplicates: false,
            reload_on_delete: false,
            ttl: Duration::ZERO,
            cost: 0,
            debug: false,
            allow_duplicates: false,
        }
    }

    /// Async loader invoked on cache miss. Required before `build()`.
    pub fn with_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |key: K| {
            Box::pin(loader(key)) as Pin<Box<dyn Future<Output = anyhow::Result<V>> + Send>>
        }));
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_second_level_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store2 = Some(store);
        self
    }

    pub fn with_broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_load_duplicate_suppression(mut self) -> Self {
        self.suppress_duplicates = true;
        self
    }

    pub fn with_reload_on_delete(mut self) -> Self {
        self.reload_on_delete = true;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Test-only: allows registering the same group name more than once, as long as each
    /// registration uses a distinct primary store. Used to exercise distributed
    /// invalidation across two in-process "peers" sharing a broker.
    pub fn allow_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    /// Validates configuration, registers `(name, store)`, configures the group on each
    /// store tier, and — if a broker is configured — subscribes to it. Fails atomically:
    /// no partial registration is left behind on error.
    pub async fn build(self) -> Result<Group<K, V>, ConfigurationError> {
        if !name_pattern().is_match(&self.name) {
            return Err(ConfigurationError::InvalidName(self.name));
        }
        let loader = self
            .loader
            .ok_or_else(|| ConfigurationError::MissingLoader(self.name.clone()))?;

        let store: Arc<dyn Store> = match self.store {
            Some(store) => store,
            None => crate::default_store::default_store(|| Arc::new(MemoryStore::new())),
        };

        registry::register(&self.name, &store, self.allow_duplicates)?;

        let config = GroupConfig {
            ttl: self.ttl,
            cost: self.cost,
        };
        store.configure_group(&self.name, &config).await?;
        if let Some(store2) = &self.store2 {
            store2.configure_group(&self.name, &config).await?;
        }

        let single_flight = self.suppress_duplicates.then(SingleFlight::new);

        let group = Group(Arc::new(GroupInner {
            name: self.name,
            loader,
            primary: store,
            store2: self.store2,
            broker: self.broker,
            single_flight,
            reload_on_delete: self.reload_on_delete,
            debug: self.debug,
            subscription: Mutex::new(None),
            store2_writes: Mutex::new(std::collections::HashMap::new()),
        }));

        subscribe_to_broker(&group).await?;

        Ok(group)
    }

    /// Convenience method to inject the cache into other libraries as a function
    /// decorator (spec §6): sets `loader` and returns a memoized `Fn(K) -> Result<V,
    /// GetError>` closure backed by the freshly built group.
    pub async fn decorate<F, Fut>(
        self,
        loader: F,
    ) -> Result<impl Fn(K) -> Pin<Box<dyn Future<Output = Result<V, crate::error::GetError>> + Send>>, ConfigurationError>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let group = self.with_loader(loader).build().await?;
        Ok(group.decorate())
    }
}
