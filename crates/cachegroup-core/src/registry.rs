//! Process-wide registry of `name -> primary store identities`, used at group
//! construction time to detect the configuration error of registering the same group
//! name twice against the same store (spec §3, "Group Registry").

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::ConfigurationError;
use crate::store::Store;

fn registry() -> &'static Mutex<HashMap<String, Vec<usize>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Vec<usize>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Identifies a store instance by the address of the data it points to, so two `Arc`
/// handles to the same underlying store compare equal regardless of how many times
/// they've been cloned.
fn store_identity(store: &Arc<dyn Store>) -> usize {
    Arc::as_ptr(store) as *const () as usize
}

/// Registers `(name, store)`, returning a `DuplicateGroup` error unless this exact pair
/// is new or `allow_duplicates` is set (test mode). Grows monotonically; never cleared
/// outside of tests.
pub fn register(
    name: &str,
    store: &Arc<dyn Store>,
    allow_duplicates: bool,
) -> Result<(), ConfigurationError> {
    let id = store_identity(store);
    let mut reg = registry().lock().unwrap();
    let entry = reg.entry(name.to_string()).or_default();

    if entry.contains(&id) {
        return Err(ConfigurationError::DuplicateGroup(name.to_string()));
    }
    if !entry.is_empty() && !allow_duplicates {
        return Err(ConfigurationError::DuplicateGroup(name.to_string()));
    }

    entry.push(id);
    Ok(())
}

/// Test-only reset of the process-wide registry, per spec §9's recommendation that the
/// registry be "a concrete collaborator with an explicit lifecycle... with a test-only
/// reset".
#[cfg(any(test, feature = "test-util"))]
pub fn reset() {
    registry().lock().unwrap().clear();
}
