//! Explicit registry of configured collections.
//!
//! A `StoreRegistry` is immutable once built. Reconfiguration builds a fresh
//! registry and swaps it into the `RegistryHandle`; readers holding the old
//! `Arc` keep a consistent view until they drop it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use metarag_core::boundary::CallGuard;
use metarag_core::config::VectorStoreConfig;
use metarag_core::error::{Error, Result};

use crate::repository::LanceRepository;

#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<LanceRepository>>,
}

impl StoreRegistry {
    /// Open one repository per entry. Entries that fail to open are logged and skipped.
    pub async fn open(configs: &[VectorStoreConfig], guard: &CallGuard) -> Self {
        Self::open_with(configs, guard, guard.timeout).await
    }

    pub async fn open_with(configs: &[VectorStoreConfig], guard: &CallGuard, embed_timeout: Duration) -> Self {
        let mut stores = BTreeMap::new();
        for cfg in configs {
            if stores.contains_key(&cfg.collection_name) {
                tracing::warn!(collection = %cfg.collection_name, "duplicate collection entry ignored");
                continue;
            }
            match LanceRepository::open(cfg, guard.clone()).await {
                Ok(repo) => {
                    tracing::info!(collection = %cfg.collection_name, dir = %cfg.persist_directory.display(), "vector store ready");
                    stores.insert(cfg.collection_name.clone(), Arc::new(repo.with_embed_timeout(embed_timeout)));
                }
                Err(e) => tracing::error!(collection = %cfg.collection_name, error = %e, "vector store skipped"),
            }
        }
        Self { stores }
    }

    pub fn get(&self, collection: &str) -> Result<Arc<LanceRepository>> {
        self.stores
            .get(collection)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("collection '{collection}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize { self.stores.len() }

    pub fn is_empty(&self) -> bool { self.stores.is_empty() }
}

/// Shared owner of the active registry.
pub struct RegistryHandle {
    inner: RwLock<Arc<StoreRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: StoreRegistry) -> Self {
        Self { inner: RwLock::new(Arc::new(registry)) }
    }

    pub fn current(&self) -> Arc<StoreRegistry> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the active registry, returning the previous one.
    pub fn swap(&self, registry: StoreRegistry) -> Arc<StoreRegistry> {
        std::mem::replace(&mut *self.inner.write(), Arc::new(registry))
    }

    /// Build a registry from `configs` and swap it in.
    pub async fn reconfigure(&self, configs: &[VectorStoreConfig], guard: &CallGuard) -> Arc<StoreRegistry> {
        let fresh = StoreRegistry::open(configs, guard).await;
        tracing::info!(collections = fresh.len(), "vector store registry reconfigured");
        self.swap(fresh)
    }
}
