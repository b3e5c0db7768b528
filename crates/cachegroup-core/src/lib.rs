//! `cachegroup-core` — the group engine for a generic read-through caching library.
//!
//! A [`Group`] wraps a user-supplied loader `K -> V | Error` with a primary store, an
//! optional second-level store, and an optional message broker. Groups are built through
//! [`FactoryBuilder`], the sole construction path, which validates configuration and
//! registers the group in the process-wide [`registry`].

pub mod broker;
pub mod default_store;
pub mod error;
pub mod factory;
pub mod group;
pub mod key;
pub mod local_store;
pub mod message;
pub mod registry;
pub mod singleflight;
pub mod store;

pub use broker::{Broker, BrokerHandler, BrokerStore, Closer};
pub use default_store::set_default_store;
pub use error::{BrokerError, ConfigurationError, DelError, GetError, StoreError};
pub use factory::FactoryBuilder;
pub use group::{Group, Loader};
pub use key::CacheKey;
pub use local_store::MemoryStore;
pub use message::InvalidationMessage;
pub use singleflight::SingleFlight;
pub use store::{GroupConfig, GroupKey, Store, StoredValue};
