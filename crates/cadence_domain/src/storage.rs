use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Narrow persistence seam. The core only ever reads and writes opaque
/// strings; where they live is the caller's concern.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage backend, used by tests and headless tooling.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// A loaded collection plus an advisory message when the persisted payload
/// had to be discarded.
pub struct Loaded<T> {
    pub value: T,
    pub advisory: Option<String>,
}

/// Loads a persisted collection. Malformed JSON is treated as absent: the
/// default value is returned together with a non-fatal advisory, and the
/// failure is logged rather than propagated.
pub fn load_collection<T>(storage: &dyn KeyValueStorage, key: &str) -> Loaded<T>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = storage.get(key) else {
        return Loaded {
            value: T::default(),
            advisory: None,
        };
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Loaded {
            value,
            advisory: None,
        },
        Err(err) => {
            tracing::warn!(key, %err, "discarding malformed persisted collection");
            Loaded {
                value: T::default(),
                advisory: Some(format!("persisted data under `{key}` was unreadable; starting empty")),
            }
        }
    }
}

pub fn save_collection<T: Serialize>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}
