//! Process-wide default store (spec §3, "Default Store"), used by a factory when no
//! primary store is supplied. Initial value is `None`; the *first* group built without
//! an explicit store lazily installs a fresh in-memory map store and every later
//! default-store user shares that same instance — matching the original's package-level
//! `var defaultStore Store = NewHashMapStore()`.

use std::sync::{Arc, OnceLock};

use crate::store::Store;

type Installer = fn() -> Arc<dyn Store>;

fn slot() -> &'static std::sync::Mutex<Option<Arc<dyn Store>>> {
    static SLOT: OnceLock<std::sync::Mutex<Option<Arc<dyn Store>>>> = OnceLock::new();
    SLOT.get_or_init(|| std::sync::Mutex::new(None))
}

/// Overrides the process-wide default store. Intended to be called once, early in
/// process startup, by the host application.
pub fn set_default_store(store: Arc<dyn Store>) {
    *slot().lock().unwrap() = Some(store);
}

/// Returns the current default store, installing `fallback()` the first time this is
/// called if none has been set yet.
pub fn default_store(fallback: Installer) -> Arc<dyn Store> {
    let mut guard = slot().lock().unwrap();
    if let Some(store) = guard.as_ref() {
        return store.clone();
    }
    let store = fallback();
    *guard = Some(store.clone());
    store
}

#[cfg(any(test, feature = "test-util"))]
pub fn reset() {
    *slot().lock().unwrap() = None;
}
