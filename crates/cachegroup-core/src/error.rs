use std::sync::Arc;

use thiserror::Error;

/// Error returned by a [`crate::store::Store`]. `NotFound` is the dedicated sentinel the
/// engine consumes and never surfaces to callers; anything else is a genuine backend
/// failure and is propagated verbatim.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(Arc<anyhow::Error>),
}

impl StoreError {
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Backend(Arc::new(err.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Error surfaced from [`crate::broker::Broker`] operations. Publish failures are logged,
/// not surfaced to callers (see `Group::del`); subscribe failures abort group construction.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker send failed: {0}")]
    Send(anyhow::Error),
    #[error("broker subscribe failed: {0}")]
    Subscribe(anyhow::Error),
}

/// Error from `Group::get`.
#[derive(Debug, Clone, Error)]
pub enum GetError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("loader error: {0}")]
    Loader(Arc<anyhow::Error>),
}

impl GetError {
    pub fn loader(err: impl Into<anyhow::Error>) -> Self {
        GetError::Loader(Arc::new(err.into()))
    }
}

/// Error from `Group::del`. Distinct from [`GetError`] only in the reload-on-delete path,
/// where a failed reload leaves the previously cached value untouched rather than evicted.
#[derive(Debug, Clone, Error)]
pub enum DelError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("loader error during reload: {0}")]
    Loader(Arc<anyhow::Error>),
}

impl From<GetError> for DelError {
    fn from(err: GetError) -> Self {
        match err {
            GetError::Store(e) => DelError::Store(e),
            GetError::Loader(e) => DelError::Loader(e),
        }
    }
}

/// Fatal at group construction: empty/invalid name, missing loader, duplicate
/// `(name, store)` registration, or a store refusing a declared `ttl`/`cost`.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid group name {0:?}: must match [A-Za-z0-9_-]+")]
    InvalidName(String),
    #[error("no loader provided for group {0:?}")]
    MissingLoader(String),
    #[error("group {0:?} already registered for this store")]
    DuplicateGroup(String),
    #[error("store cannot honor ttl for group {0:?}")]
    TtlUnsupported(String),
    #[error("store cannot honor cost for group {0:?}")]
    CostUnsupported(String),
    #[error("broker subscription failed during construction: {0}")]
    Broker(#[from] BrokerError),
}
