// src/plugin/registry.rs - Process-wide plugin registries
//
// Discovery happens once at process (or test-harness) start; after that the
// registries are read-only. Registering two plugins under one key is a
// startup failure, never a per-request condition. Concurrent reads are safe;
// concurrent registration after startup is not supported.

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

use super::{NamerPlugin, ProtocolPlugin};

/// A registry of named plugins. Protocol and namer registries share this
/// shape; only the key and the plugin trait differ.
pub struct Registry<P: ?Sized> {
    entries: DashMap<String, Arc<P>>,
}

/// Protocol plugins, keyed by protocol name (`http`, `thrift`, ...).
pub type ProtocolRegistry = Registry<dyn ProtocolPlugin>;

/// Namer plugins, keyed by namer `kind`.
pub type NamerRegistry = Registry<dyn NamerPlugin>;

impl<P: ?Sized> Registry<P> {
    pub fn new() -> Self {
        Registry {
            entries: DashMap::new(),
        }
    }

    /// Register a plugin under `key`. Duplicate keys are a startup error.
    pub fn register(&self, key: &str, plugin: Arc<P>) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => {
                anyhow::bail!("plugin '{}' is already registered", key)
            }
            Entry::Vacant(slot) => {
                slot.insert(plugin);
                tracing::debug!(key, "plugin registered");
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<P>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted for stable reporting.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: ?Sized> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_plugins::http::HttpProtocol;
    use crate::builtin_plugins::thrift::ThriftProtocol;

    #[test]
    fn test_register_and_get() {
        let registry = ProtocolRegistry::new();
        registry.register("http", Arc::new(HttpProtocol)).unwrap();
        registry.register("thrift", Arc::new(ThriftProtocol)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("http").is_some());
        assert!(registry.get("h2").is_none());
        assert_eq!(registry.keys(), vec!["http".to_string(), "thrift".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = ProtocolRegistry::new();
        registry.register("http", Arc::new(HttpProtocol)).unwrap();
        let err = registry.register("http", Arc::new(HttpProtocol));
        assert!(err.is_err());
        assert_eq!(registry.len(), 1);
    }
}
