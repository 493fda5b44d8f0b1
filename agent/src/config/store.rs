//! Key/value configuration stores
//!
//! Everything deployhook knows about projects and chains comes from a
//! [`ConfigStore`]. Lookups are never cached so edits to the environment
//! file take effect on the next request.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

/// Read-only key/value lookup
pub trait ConfigStore: Send + Sync {
    /// Look up a single value
    fn get(&self, key: &str) -> Option<String>;

    /// All keys currently present, in no particular order
    fn keys(&self) -> Vec<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvStore;

impl ConfigStore for EnvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars_os()
            .filter_map(|(key, _)| key.into_string().ok())
            .collect()
    }
}

/// In-memory store, mutable through a shared reference
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values
            .read()
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A `KEY=VALUE` environment file, re-read on every lookup
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_env_file(&content),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Environment file not readable");
                BTreeMap::new()
            }
        }
    }
}

impl ConfigStore for EnvFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.load().into_keys().collect()
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    warn!(line = index + 1, "Skipping environment entry with empty key");
                    continue;
                }
                values.insert(key.to_string(), strip_quotes(value.trim()).to_string());
            }
            None => warn!(line = index + 1, "Skipping malformed environment line"),
        }
    }

    values
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Stores consulted in order; the first one holding a key wins
#[derive(Clone, Default)]
pub struct LayeredStore {
    layers: Vec<Arc<dyn ConfigStore>>,
}

impl LayeredStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: Arc<dyn ConfigStore>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl ConfigStore for LayeredStore {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    fn keys(&self) -> Vec<String> {
        let keys: BTreeSet<String> = self.layers.iter().flat_map(|layer| layer.keys()).collect();
        keys.into_iter().collect()
    }
}
