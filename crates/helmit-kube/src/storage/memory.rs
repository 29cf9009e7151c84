//! In-process storage driver
//!
//! Records live only as long as the driver. Selected with `HELM_DRIVER=memory`
//! and used by tests that need release storage without a cluster.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{StorageDriver, sort_newest_first};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// (namespace, name) -> version -> release
type Store = HashMap<(String, String), BTreeMap<u32, StoredRelease>>;

#[derive(Clone, Default)]
pub struct MemoryDriver {
    store: Arc<RwLock<Store>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored revisions across all releases
    pub async fn len(&self) -> usize {
        self.store.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn not_found(namespace: &str, name: &str) -> KubeError {
    KubeError::ReleaseNotFound {
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        self.store
            .read()
            .await
            .get(&key(namespace, name))
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<StoredRelease>> {
        let store = self.store.read().await;
        let mut releases: Vec<StoredRelease> = store
            .iter()
            .filter(|((ns, n), _)| {
                namespace.is_none_or(|want| want == ns) && name.is_none_or(|want| want == n)
            })
            .flat_map(|(_, versions)| versions.values().cloned())
            .collect();

        sort_newest_first(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let mut store = self.store.write().await;
        let versions = store
            .entry(key(&release.namespace, &release.name))
            .or_default();

        if versions.contains_key(&release.version) {
            return Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            });
        }

        versions.insert(release.version, release.clone());
        Ok(())
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        let mut store = self.store.write().await;
        match store
            .get_mut(&key(&release.namespace, &release.name))
            .and_then(|versions| versions.get_mut(&release.version))
        {
            Some(slot) => {
                *slot = release.clone();
                Ok(())
            }
            None => Err(not_found(&release.namespace, &release.name)),
        }
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let removed = self
            .store
            .write()
            .await
            .remove(&key(namespace, name))
            .ok_or_else(|| not_found(namespace, name))?;

        Ok(removed.into_values().rev().collect())
    }
}
