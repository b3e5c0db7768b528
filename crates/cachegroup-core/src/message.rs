//! Wire format for distributed invalidation (spec §4.7). Reference encoding is compact
//! JSON with lower-case field names; consumers must tolerate unknown fields.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::key::CacheKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct InvalidationMessage<K> {
    pub group: String,
    pub key: K,
}

impl<K: CacheKey> InvalidationMessage<K> {
    pub fn new(group: impl Into<String>, key: K) -> Self {
        Self {
            group: group.into(),
            key,
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Wire envelope decoded before the key's concrete type is known. Spec §4.1.3 treats
/// malformed bytes, a foreign `group`, and an uncoercible `key` as three independent
/// failure modes; decoding `key` as a [`serde_json::Value`] first lets the group-name
/// filter run before the engine ever tries to coerce a key shaped for a different group
/// sharing the same topic (expected per §4.7, not an error).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct RawInvalidationEnvelope {
    pub group: String,
    pub key: serde_json::Value,
}

impl RawInvalidationEnvelope {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Coerces `key` into the group's key type. Fails independently of, and after, the
    /// group-name check — a key shape mismatch on a message already filtered to this
    /// group's name is a genuine `DecodeWarning`, unlike a foreign group's message.
    pub fn coerce_key<K: DeserializeOwned>(&self) -> Result<K, serde_json::Error> {
        serde_json::from_value(self.key.clone())
    }
}
