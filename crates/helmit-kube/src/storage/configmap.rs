//! Kubernetes ConfigMaps storage driver

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use std::collections::BTreeMap;

use super::{
    RELEASE_KEY, StorageConfig, StorageDriver, compression_of, decode_release, encode_release,
    label_selector, sort_newest_first, storage_labels,
};
use crate::error::{KubeError, Result};
use crate::release::{StoredRelease, storage_key};

/// Stores release records in ConfigMaps (readable by anyone with ConfigMap access)
pub struct ConfigMapDriver {
    client: Client,
    config: StorageConfig,
}

impl ConfigMapDriver {
    pub fn with_client(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn api(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build_config_map(&self, release: &StoredRelease) -> Result<ConfigMap> {
        let encoded = encode_release(release, self.config.compression)?;

        Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(release.storage_key()),
                namespace: Some(release.namespace.clone()),
                labels: Some(storage_labels(release, self.config.compression)),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(RELEASE_KEY.to_string(), encoded)])),
            ..Default::default()
        })
    }

    fn parse_config_map(&self, cm: &ConfigMap) -> Result<StoredRelease> {
        let encoded = cm
            .data
            .as_ref()
            .and_then(|d| d.get(RELEASE_KEY))
            .ok_or_else(|| KubeError::Storage("configmap has no release data".to_string()))?;

        decode_release(
            encoded,
            compression_of(cm.metadata.labels.as_ref(), self.config.compression),
        )
    }
}

#[async_trait]
impl StorageDriver for ConfigMapDriver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        match self.api(namespace).get(&storage_key(name, version)).await {
            Ok(cm) => self.parse_config_map(&cm),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<StoredRelease>> {
        let lp = ListParams::default().labels(&label_selector(name));
        let maps = match namespace {
            Some(ns) => self.api(ns).list(&lp).await?,
            None => Api::<ConfigMap>::all(self.client.clone()).list(&lp).await?,
        };

        let mut releases = Vec::with_capacity(maps.items.len());
        for cm in &maps.items {
            match self.parse_config_map(cm) {
                Ok(release) => releases.push(release),
                Err(e) => tracing::warn!(
                    configmap = cm.metadata.name.as_deref().unwrap_or_default(),
                    error = %e,
                    "skipping unreadable release record"
                ),
            }
        }

        sort_newest_first(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let cm = self.build_config_map(release)?;
        match self
            .api(&release.namespace)
            .create(&PostParams::default(), &cm)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        let cm = self.build_config_map(release)?;
        self.api(&release.namespace)
            .replace(&release.storage_key(), &PostParams::default(), &cm)
            .await?;
        Ok(())
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.history(namespace, name).await?;
        let api = self.api(namespace);

        for release in &releases {
            if let Err(e) = api
                .delete(&release.storage_key(), &DeleteParams::default())
                .await
            {
                let err = KubeError::from(e);
                if !err.is_not_found() {
                    return Err(err);
                }
            }
        }

        Ok(releases)
    }
}
