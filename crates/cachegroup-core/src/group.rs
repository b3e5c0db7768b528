//! The group engine (spec §4.1): read-through/write-through, two-level orchestration,
//! single-flight routing, and the inbound-invalidation handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::broker::{Broker, Closer};
use crate::error::{DelError, GetError, StoreError};
use crate::key::CacheKey;
use crate::message::{InvalidationMessage, RawInvalidationEnvelope};
use crate::singleflight::SingleFlight;
use crate::store::{downcast, erase, Store};

/// User-supplied loader: `K -> V | Error`.
pub type Loader<K, V> =
    Arc<dyn Fn(K) -> Pin<Box<dyn Future<Output = anyhow::Result<V>> + Send>> + Send + Sync>;

pub(crate) struct GroupInner<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) name: String,
    pub(crate) loader: Loader<K, V>,
    pub(crate) primary: Arc<dyn Store>,
    pub(crate) store2: Option<Arc<dyn Store>>,
    pub(crate) broker: Option<Arc<dyn Broker>>,
    pub(crate) single_flight: Option<SingleFlight<K, V, GetError>>,
    pub(crate) reload_on_delete: bool,
    pub(crate) debug: bool,
    pub(crate) subscription: Mutex<Option<Box<dyn Closer>>>,
    /// Per-key chain of fire-and-forget second-level writes, keyed by `store_key`, so
    /// that two loads for the same key (e.g. a `reload_on_delete` racing a concurrent
    /// fresh `Get`) land on the second level in the order they were produced, mirroring
    /// `CachingStoreState::spawn`'s task-chaining. Writes for distinct keys are never
    /// ordered against each other.
    pub(crate) store2_writes: Mutex<HashMap<String, JoinHandle<()>>>,
}

/// A named, typed cache over one loader. Cheap to clone; all state is shared via `Arc`.
/// Built exclusively through [`crate::factory::FactoryBuilder`].
pub struct Group<K, V>(pub(crate) Arc<GroupInner<K, V>>)
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static;

impl<K, V> Clone for Group<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Group(self.0.clone())
    }
}

impl<K, V> Group<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.0.name
    }

    fn log_debug(&self, message: &str) {
        if self.0.debug {
            debug!(group = %self.0.name, "{}", message);
        }
    }

    /// Read-through `Get`: primary -> (miss) second level -> (miss) single-flighted
    /// loader. A write error on the primary store is returned to the caller; a
    /// second-level write failure is logged, not surfaced.
    #[instrument(name = "group.get", skip(self, key), fields(group = %self.0.name))]
    pub async fn get(&self, key: K) -> Result<V, GetError> {
        let key_str = key.to_string();
        let gk = self.0.primary.key(&self.0.name, &key_str);

        match self.0.primary.get(&gk).await {
            Ok(boxed) => {
                self.log_debug("primary hit");
                return downcast::<V>(boxed).map_err(GetError::from);
            }
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(store2) = &self.0.store2 {
            let gk2 = store2.key(&self.0.name, &key_str);
            match store2.get(&gk2).await {
                Ok(boxed) => {
                    self.log_debug("second-level hit");
                    return downcast::<V>(boxed).map_err(GetError::from);
                }
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }

        self.load_and_store(key).await
    }

    /// Invalidate `key`. In the default "evict" mode, deletes locally synchronously (a
    /// failure here is surfaced) and, if a second level is present, deletes there too —
    /// a second-level delete failure is logged, not surfaced, same as any other
    /// second-level write-path error (spec §7). Then publishes an invalidation message
    /// asynchronously. In "reload-on-delete" mode, blocks until a fresh value has
    /// replaced the old one in the primary store instead of evicting.
    #[instrument(name = "group.del", skip(self, key), fields(group = %self.0.name))]
    pub async fn del(&self, key: K) -> Result<(), DelError> {
        if self.0.reload_on_delete {
            return self.load_and_store(key).await.map(|_| ()).map_err(DelError::from);
        }

        let key_str = key.to_string();
        self.log_debug("delete key");

        let gk = self.0.primary.key(&self.0.name, &key_str);
        self.0.primary.del(&gk).await?;

        if let Some(store2) = &self.0.store2 {
            let gk2 = store2.key(&self.0.name, &key_str);
            if let Err(err) = store2.del(&gk2).await {
                warn!(group = %self.0.name, %err, "second-level delete failed");
            }
        }

        if let Some(broker) = self.0.broker.clone() {
            let msg = InvalidationMessage::new(self.0.name.clone(), key);
            let group = self.0.name.clone();
            tokio::spawn(async move {
                match msg.to_bytes() {
                    Ok(bytes) => {
                        if let Err(err) = broker.send(bytes).await {
                            warn!(group = %group, %err, "invalidation publish failed");
                        }
                    }
                    Err(err) => warn!(group = %group, %err, "failed to encode invalidation message"),
                }
            });
        }

        Ok(())
    }

    /// Returns a memoized function decorating `loader` with this group's cache. Does not
    /// change the loader the group was constructed with; useful for injecting the cache
    /// into other libraries as a plain closure (spec §6).
    pub fn decorate(&self) -> impl Fn(K) -> Pin<Box<dyn Future<Output = Result<V, GetError>> + Send>> {
        let group = self.clone();
        move |key: K| {
            let group = group.clone();
            Box::pin(async move { group.get(key).await })
        }
    }

    async fn load_and_store(&self, key: K) -> Result<V, GetError> {
        let inner = self.0.clone();
        let key_for_work = key.clone();

        let work = move || {
            let inner = inner.clone();
            let key = key_for_work.clone();
            async move { load_and_store_inner(&inner, key).await }
        };

        if let Some(single_flight) = &self.0.single_flight {
            single_flight.do_work(key, work).await
        } else {
            work().await
        }
    }

    /// Local-only invalidation triggered by an inbound broker message (spec §4.1.3): no
    /// second-level delete, no re-publish, always an evict even if `reload_on_delete` is
    /// set (the node that issued the original `Del` owns the reload).
    async fn handle_local_invalidation(&self, key_str: &str) {
        let gk = self.0.primary.key(&self.0.name, key_str);
        if let Err(err) = self.0.primary.del(&gk).await {
            warn!(group = %self.0.name, %err, "local invalidation of primary store failed");
        }
    }
}

async fn load_and_store_inner<K, V>(inner: &Arc<GroupInner<K, V>>, key: K) -> Result<V, GetError>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    let key_str = key.to_string();
    info!(group = %inner.name, key = %key_str, "invoking loader");

    let value = (inner.loader)(key).await.map_err(GetError::loader)?;

    let gk = inner.primary.key(&inner.name, &key_str);
    inner.primary.set(&gk, erase(value.clone())).await?;

    if let Some(store2) = inner.store2.clone() {
        spawn_chained_store2_write(inner.clone(), store2, key_str, value.clone());
    }

    Ok(value)
}

/// Spawns the fire-and-forget second-level write for `key_str`, chained behind any
/// still-in-flight write this group previously spawned for the same key, so that two
/// back-to-back loads for one key (a reload racing a concurrent fresh `Get`) land on the
/// second level in the order they were produced. Writes for distinct keys are
/// independent and run concurrently.
fn spawn_chained_store2_write<K, V>(
    inner: Arc<GroupInner<K, V>>,
    store2: Arc<dyn Store>,
    key_str: String,
    value: V,
) where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    // `remove` then `spawn` then `insert` happen under one lock acquisition (`spawn`
    // itself is synchronous — it hands the future to the runtime and returns
    // immediately) so two racing loads for the same key can't both observe the same
    // `previous` handle and silently drop a link out of the chain.
    let mut writes = inner.store2_writes.lock().unwrap();
    let previous = writes.remove(&key_str);

    let name_for_task = inner.name.clone();
    let key_str_for_task = key_str.clone();
    let task = tokio::spawn(async move {
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        let gk2 = store2.key(&name_for_task, &key_str_for_task);
        if let Err(err) = store2.set(&gk2, erase(value)).await {
            warn!(group = %name_for_task, %err, "second-level write failed");
        }
    });

    writes.insert(key_str, task);
}

/// Subscribes `group` to its broker, if one is configured, wiring inbound invalidation
/// messages to [`Group::handle_local_invalidation`]. Called once, at construction time,
/// by [`crate::factory::FactoryBuilder::build`].
pub(crate) async fn subscribe_to_broker<K, V>(group: &Group<K, V>) -> Result<(), crate::error::BrokerError>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    let Some(broker) = group.0.broker.clone() else {
        return Ok(());
    };

    let group = group.clone();
    let handler: crate::broker::BrokerHandler = Arc::new(move |bytes| {
        let group = group.clone();
        tokio::spawn(async move {
            // Decode the envelope with `key` left as an untyped JSON value first: a
            // topic shared across groups (spec §4.7) routinely carries messages whose
            // key shape belongs to a different group, and that must be a silent drop,
            // not a "malformed message" warning (spec §4.1.3 steps 2 and 3 are
            // independent checks, in that order).
            let envelope = match RawInvalidationEnvelope::from_bytes(&bytes) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(group = %group.0.name, %err, "dropping malformed invalidation message");
                    return;
                }
            };
            if envelope.group != group.0.name {
                return;
            }
            let key: K = match envelope.coerce_key() {
                Ok(key) => key,
                Err(err) => {
                    warn!(group = %group.0.name, %err, "dropping invalidation message with incompatible key type");
                    return;
                }
            };
            group.handle_local_invalidation(&key.to_string()).await;
        });
    });

    let closer = broker.subscribe(handler).await?;
    *group.0.subscription.lock().unwrap() = Some(closer);
    Ok(())
}
