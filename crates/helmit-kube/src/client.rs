//! High-level Kubernetes client for helmit operations
//!
//! Combines release storage, template rendering and resource management
//! behind install / list / uninstall.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use helmit_core::{Chart, CoreError, LintError, ReleaseInfo, TemplateContext};
use helmit_engine::Engine;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};

use crate::actions::{InstallOptions, ListOptions, UninstallOptions};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;
use crate::resources::ResourceManager;
use crate::storage::StorageDriver;

/// High-level Kubernetes client for helmit
pub struct KubeClient<S: StorageDriver> {
    client: kube::Client,
    storage: S,
    engine: Engine,
}

impl<S: StorageDriver> KubeClient<S> {
    /// Create with an existing Kubernetes client
    pub fn with_client(client: kube::Client, storage: S) -> Self {
        Self {
            client,
            storage,
            engine: Engine::builder().strict(true).build(),
        }
    }

    // ========== Install ==========

    /// Install a chart as a new release
    ///
    /// The release is recorded as pending before anything is applied, then
    /// marked deployed or failed depending on the apply outcome.
    pub async fn install(&self, chart: &Chart, options: &InstallOptions) -> Result<StoredRelease> {
        if !self
            .storage
            .list(Some(&options.namespace), Some(&options.name))
            .await?
            .is_empty()
        {
            return Err(KubeError::ReleaseAlreadyExists {
                name: options.name.clone(),
                namespace: options.namespace.clone(),
            });
        }

        let mut release = render_release(&self.engine, chart, options)?;
        tracing::info!(
            release = %release.name,
            namespace = %release.namespace,
            chart = %release.chart.name,
            "installing release"
        );

        if options.create_namespace {
            self.ensure_namespace(&options.namespace).await?;
        }

        self.storage.create(&release).await?;

        let applied = with_timeout(options.timeout, async {
            ResourceManager::new(self.client.clone())
                .await?
                .apply_manifest(&release.namespace, &release.manifest)
                .await?
                .into_result("apply")
        })
        .await;

        match applied {
            Ok(summary) => {
                tracing::debug!(release = %release.name, "{}", summary.summary());
                release.mark_deployed();
                self.storage.update(&release).await?;
                Ok(release)
            }
            Err(e) => {
                release.mark_failed(e.to_string());
                self.storage.update(&release).await?;
                Err(e)
            }
        }
    }

    async fn ensure_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        match api.create(&PostParams::default(), &namespace).await {
            Ok(_) => {
                tracing::debug!(namespace = name, "created namespace");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ========== List ==========

    /// Latest revision of every release matching `options`
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<StoredRelease>> {
        let matcher = options.matcher()?;
        let releases = self.storage.list(options.namespace.as_deref(), None).await?;

        Ok(latest_revisions(releases)
            .into_iter()
            .filter(|r| matcher.as_ref().is_none_or(|re| re.is_match(&r.name)))
            .collect())
    }

    // ========== Uninstall ==========

    /// Delete a release's resources, then purge its records
    pub async fn uninstall(&self, options: &UninstallOptions) -> Result<StoredRelease> {
        let mut release = self
            .storage
            .get_latest(&options.namespace, &options.name)
            .await?;

        tracing::info!(release = %release.name, namespace = %release.namespace, "uninstalling release");
        release.mark_uninstalling();
        self.storage.update(&release).await?;

        with_timeout(options.timeout, async {
            ResourceManager::new(self.client.clone())
                .await?
                .delete_manifest(&release.namespace, &release.manifest)
                .await?
                .into_result("delete")
        })
        .await
        .map_err(|e| KubeError::Uninstall {
            name: release.name.clone(),
            message: e.to_string(),
        })?;

        self.storage
            .delete_all(&options.namespace, &options.name)
            .await?;

        release.mark_uninstalled();
        Ok(release)
    }
}

/// Render a chart into a pending first revision
pub fn render_release(
    engine: &Engine,
    chart: &Chart,
    options: &InstallOptions,
) -> Result<StoredRelease> {
    let metadata = chart
        .metadata
        .as_ref()
        .ok_or(CoreError::Lint(LintError::NoMetadata))?;
    if metadata.is_library() {
        return Err(CoreError::InvalidChart {
            message: format!("library chart {} is not installable", metadata.name),
        }
        .into());
    }

    let mut values = chart.values.clone();
    values.merge(&options.values);

    let release_info = ReleaseInfo::for_install(&options.name, &options.namespace);
    let context = TemplateContext::new(values.clone(), release_info, metadata);
    let rendered = engine.render_chart(chart, &context)?;

    let mut release = StoredRelease::for_install(
        options.name.clone(),
        options.namespace.clone(),
        metadata.clone(),
        values,
        rendered.combined(),
    );
    release.notes = rendered.notes;
    Ok(release)
}

/// Keep the newest revision of each release; input is newest first
fn latest_revisions(releases: Vec<StoredRelease>) -> Vec<StoredRelease> {
    let mut seen = HashSet::new();
    releases
        .into_iter()
        .filter(|r| seen.insert((r.namespace.clone(), r.name.clone())))
        .collect()
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| KubeError::Timeout(format!("{}s", limit.as_secs())))?
}
