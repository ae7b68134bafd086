//! Concurrency-safe variable store with seed/capture precedence

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    seeded: bool,
}

/// Name -> value mapping shared by the actions of one repository.
///
/// Two ways to write:
/// - [`seed`](Self::seed) records a value supplied by run configuration. It
///   always overwrites and marks the name as seeded.
/// - [`set`](Self::set) records a value captured by the engine during the
///   run. It never overwrites a seeded name; captures overwrite each other.
#[derive(Debug, Default)]
pub struct VariableStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `seeds`
    pub fn seeded<'a>(seeds: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let store = Self::new();
        for (name, value) in seeds {
            store.seed(name, value);
        }
        store
    }

    pub fn seed(&self, name: &str, value: &str) {
        self.lock().insert(
            name.trim().to_string(),
            Entry {
                value: value.to_string(),
                seeded: true,
            },
        );
    }

    /// Capture a value. Returns false when a seeded value took precedence.
    pub fn set(&self, name: &str, value: &str) -> bool {
        let mut entries = self.lock();
        let name = name.trim();
        if entries.get(name).is_some_and(|e| e.seeded) {
            tracing::debug!(variable = name, "capture ignored, variable is seeded");
            return false;
        }
        entries.insert(
            name.to_string(),
            Entry {
                value: value.to_string(),
                seeded: false,
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name.trim()).map(|e| e.value.clone())
    }

    pub fn is_seeded(&self, name: &str) -> bool {
        self.lock().get(name.trim()).is_some_and(|e| e.seeded)
    }

    /// Copy of every variable, sorted by name
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
