//! The broker abstraction (spec §4.3): a pub/sub transport used to fan invalidation
//! messages out to peer processes. Ordering across subscribers is not required and
//! at-least-once delivery is acceptable — the protocol is idempotent under duplicates.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BrokerError;

/// Invoked once per received message. May be called concurrently across messages.
pub type BrokerHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Returned by `Broker::subscribe`; stops delivery and releases resources when closed.
/// Mirrors `io.Closer` in the original Go broker contract.
pub trait Closer: Send + Sync {
    fn close(self: Box<Self>);
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a raw payload to all subscribers, including, potentially, this process's
    /// own subscription (loopback — see spec §4.7).
    async fn send(&self, payload: Bytes) -> Result<(), BrokerError>;

    /// Register a handler invoked once per received message.
    async fn subscribe(&self, handler: BrokerHandler) -> Result<Box<dyn Closer>, BrokerError>;
}

/// Convenience bound for adapters that are themselves pub/sub-capable stores (e.g. a
/// Redis-backed store that also doubles as the broker). No engine behavior depends on
/// this; it only exists so adapter authors can write one type and satisfy both traits in
/// one bound, mirroring the original's `BrokerStore` interface (`MessageBroker` + `Store`).
pub trait BrokerStore: crate::store::Store + Broker {}

impl<T: crate::store::Store + Broker> BrokerStore for T {}
