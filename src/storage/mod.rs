//! Persistence layer.
//!
//! A small string key-value port (`KeyValueStore`) with a JSON-file
//! implementation for the binary and an in-memory one for tests. Values
//! are JSON documents serialized to strings; the file holds one object
//! mapping keys to those strings.

pub mod daily;
pub mod prefs;

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Read-at-init, write-on-change persistence port.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Whole-file JSON map, rewritten on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store {}", path.display()))?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse store {}", path.display()))?;
            info!(path = %path.display(), keys = entries.len(), "Preference store loaded");
            entries
        } else {
            info!(path = %path.display(), "No preference store found, starting fresh");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store lock poisoned"))?;
        let previous = entries.insert(key.to_string(), value.to_string());

        let written = serde_json::to_string_pretty(&*entries)
            .context("Failed to serialise preference store")
            .and_then(|json| {
                std::fs::write(&self.path, json)
                    .with_context(|| format!("Failed to write store {}", self.path.display()))
            });
        if let Err(e) = written {
            // Keep the map in step with what is on disk.
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }

        debug!(path = %self.path.display(), key, "Preference saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("sniper_test_store_{}.json", uuid::Uuid::new_v4()));
        p
    }

    #[test]
    fn test_file_store_roundtrip_across_opens() {
        let path = temp_path();
        {
            let store = JsonFileStore::open(&path).unwrap();
            assert!(store.get("favorites").unwrap().is_none());
            store.set("favorites", r#"["opp-1"]"#).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("favorites").unwrap().as_deref(), Some(r#"["opp-1"]"#));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_rolls_back_on_write_failure() {
        let path = std::env::temp_dir()
            .join(format!("sniper_missing_dir_{}", uuid::Uuid::new_v4()))
            .join("store.json");
        let store = JsonFileStore::open(&path).unwrap();

        assert!(store.set("favorites", r#"["opp-1"]"#).is_err());
        assert!(store.get("favorites").unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_entries([("watchlist", "[]")]);
        assert_eq!(store.get("watchlist").unwrap().as_deref(), Some("[]"));
        store.set("watchlist", r#"["EUR/USD"]"#).unwrap();
        assert_eq!(store.get("watchlist").unwrap().as_deref(), Some(r#"["EUR/USD"]"#));
        assert!(store.get("missing").unwrap().is_none());
    }
}
