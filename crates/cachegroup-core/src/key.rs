//! The key bound for a cache group. The original Go implementation constrains keys to
//! `int64 | string | uint64`; a Rust reimplementation generalizes this to "anything
//! hashable, displayable, and serializable", which covers those three plus any newtype a
//! caller wants to use.

use std::fmt::Display;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Keys must be:
/// - `Eq + Hash + Clone` so the single-flight coordinator can index in-flight loads by
///   key equality (spec §4.4).
/// - `Display` so the store projection (`Store::key`) has a canonical string form.
/// - `Serialize + DeserializeOwned` so the key can ride inside a wire
///   [`crate::message::InvalidationMessage`].
pub trait CacheKey: Clone + Eq + Hash + Display + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> CacheKey for T where
    T: Clone + Eq + Hash + Display + Send + Sync + Serialize + DeserializeOwned + 'static
{
}
