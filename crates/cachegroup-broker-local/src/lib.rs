//! A [`cachegroup_core::Broker`] backed by `tokio::sync::broadcast`, for wiring up
//! several in-process "peers" that share one cache without reaching for a real
//! message queue. Not suitable across process boundaries — see
//! [`LocalBroker`] for the scope this is meant to cover.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cachegroup_core::{Broker, BrokerError, BrokerHandler, Closer};

/// An in-process broker: every [`LocalBroker`] clone sharing the same sender fans
/// messages out to every subscriber, including the publisher's own subscription
/// (loopback). Built for tests and single-process demos with multiple cache groups
/// standing in for multiple peers; a real deployment wants a broker backed by an
/// actual transport (NATS, Redis, etc.) instead.
#[derive(Clone)]
pub struct LocalBroker {
    tx: broadcast::Sender<Bytes>,
}

impl LocalBroker {
    /// `capacity` bounds how many unreceived messages the channel buffers per
    /// subscriber before the slowest one starts missing messages; `RecvError::Lagged`
    /// is swallowed as a log line rather than surfaced, since invalidation delivery
    /// is already best-effort (spec's broker contract promises at-least-once, not
    /// exactly-once).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(256)
    }
}

struct BroadcastCloser(JoinHandle<()>);

impl Closer for BroadcastCloser {
    fn close(self: Box<Self>) {
        self.0.abort();
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn send(&self, payload: Bytes) -> Result<(), BrokerError> {
        match self.tx.send(payload) {
            Ok(_) => Ok(()),
            // No active subscribers is not a transport failure; the message simply
            // has nobody to deliver to yet.
            Err(broadcast::error::SendError(_)) => {
                debug!("local broker publish with no active subscribers");
                Ok(())
            }
        }
    }

    async fn subscribe(&self, handler: BrokerHandler) -> Result<Box<dyn Closer>, BrokerError> {
        let mut rx = self.tx.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => handler(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "local broker subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Box::new(BroadcastCloser(task)))
    }
}
