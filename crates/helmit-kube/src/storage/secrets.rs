//! Kubernetes Secrets storage driver
//!
//! This is the default driver: one Secret per release revision, named after
//! [`StoredRelease::storage_key`], with the encoded record under `release`.

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
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

/// Secret type used for release records
pub const SECRET_TYPE: &str = "helmit.io/release.v1";

/// Kubernetes Secrets storage driver
pub struct SecretsDriver {
    client: Client,
    config: StorageConfig,
}

impl SecretsDriver {
    pub fn with_client(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build_secret(&self, release: &StoredRelease) -> Result<Secret> {
        let encoded = encode_release(release, self.config.compression)?;

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(release.storage_key()),
                namespace: Some(release.namespace.clone()),
                labels: Some(storage_labels(release, self.config.compression)),
                ..Default::default()
            },
            type_: Some(SECRET_TYPE.to_string()),
            data: Some(BTreeMap::from([(
                RELEASE_KEY.to_string(),
                ByteString(encoded.into_bytes()),
            )])),
            ..Default::default()
        })
    }

    fn parse_secret(&self, secret: &Secret) -> Result<StoredRelease> {
        let data = secret
            .data
            .as_ref()
            .and_then(|d| d.get(RELEASE_KEY))
            .ok_or_else(|| KubeError::Storage("secret has no release data".to_string()))?;

        let encoded = std::str::from_utf8(&data.0)
            .map_err(|e| KubeError::Storage(format!("invalid UTF-8 in secret: {e}")))?;

        decode_release(
            encoded,
            compression_of(secret.metadata.labels.as_ref(), self.config.compression),
        )
    }

    fn parse_all(&self, secrets: &[Secret]) -> Vec<StoredRelease> {
        secrets
            .iter()
            .filter_map(|secret| match self.parse_secret(secret) {
                Ok(release) => Some(release),
                Err(e) => {
                    tracing::warn!(
                        secret = secret.metadata.name.as_deref().unwrap_or_default(),
                        error = %e,
                        "skipping unreadable release record"
                    );
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl StorageDriver for SecretsDriver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        match self.api(namespace).get(&storage_key(name, version)).await {
            Ok(secret) => self.parse_secret(&secret),
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
        let secrets = match namespace {
            Some(ns) => self.api(ns).list(&lp).await?,
            None => Api::<Secret>::all(self.client.clone()).list(&lp).await?,
        };

        let mut releases = self.parse_all(&secrets.items);
        sort_newest_first(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let secret = self.build_secret(release)?;
        match self
            .api(&release.namespace)
            .create(&PostParams::default(), &secret)
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
        let secret = self.build_secret(release)?;
        self.api(&release.namespace)
            .replace(&release.storage_key(), &PostParams::default(), &secret)
            .await?;
        Ok(())
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.history(namespace, name).await?;
        let api = self.api(namespace);

        for release in &releases {
            match api.delete(&release.storage_key(), &DeleteParams::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(releases)
    }
}
