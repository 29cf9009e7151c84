//! Install-verify-uninstall smoke test for a chart
//!
//! A chart passes when it installs under a generated release name, exactly
//! one release with that name is listed afterwards and it is `deployed`, and
//! the release can then be uninstalled again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use helmit_core::Chart;

use crate::actions::{DEFAULT_INSTALL_TIMEOUT, InstallOptions, ListOptions, UninstallOptions};
use crate::client::KubeClient;
use crate::config::{DEFAULT_KUBECONFIG, client_from_kubeconfig};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;
use crate::storage::{Driver, DriverKind, StorageConfig, StorageDriver};

/// Namespace smoke-test releases are installed into
pub const TEST_NAMESPACE: &str = "helmit-test-release";

/// Prefix of generated release names
pub const RELEASE_NAME_PREFIX: &str = "helmit-test-release-";

const RELEASE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Smoke test settings
#[derive(Debug, Clone)]
pub struct SmokeTestConfig {
    /// Kubeconfig used to reach the cluster
    pub kubeconfig: PathBuf,

    pub namespace: String,

    pub release_prefix: String,

    pub timeout: Duration,
}

impl Default for SmokeTestConfig {
    fn default() -> Self {
        Self {
            kubeconfig: PathBuf::from(DEFAULT_KUBECONFIG),
            namespace: TEST_NAMESPACE.to_string(),
            release_prefix: RELEASE_NAME_PREFIX.to_string(),
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

impl SmokeTestConfig {
    /// Release name for a test started at `now`
    pub fn release_name(&self, now: DateTime<Local>) -> String {
        format!("{}{}", self.release_prefix, now.format(RELEASE_TIMESTAMP_FORMAT))
    }
}

/// How a chart path is decoded, chosen by its extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    /// `.tgz` / `.tar.gz` packaged chart
    Archive(PathBuf),
    /// A lone `Chart.yaml`-style descriptor
    Descriptor(PathBuf),
    /// Anything else: directory or archive, decided by the loader
    Path(PathBuf),
}

impl ChartSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
            Self::Archive(path)
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            Self::Descriptor(path)
        } else {
            Self::Path(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(p) | Self::Descriptor(p) | Self::Path(p) => p,
        }
    }

    /// Decode the chart without linting it
    pub fn load(&self) -> Result<Chart> {
        let chart = match self {
            Self::Archive(path) => helmit_core::load_archive(&read(path)?)?,
            Self::Descriptor(path) => helmit_core::load_descriptor(&read(path)?)?,
            Self::Path(path) => helmit_core::load(path)?,
        };
        Ok(chart)
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| KubeError::io(path, e))
}

/// Release operations the smoke test drives
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    async fn install(&self, chart: &Chart, options: &InstallOptions) -> Result<StoredRelease>;

    async fn list(&self, options: &ListOptions) -> Result<Vec<StoredRelease>>;

    async fn uninstall(&self, options: &UninstallOptions) -> Result<StoredRelease>;
}

#[async_trait]
impl<S: StorageDriver> ReleaseBackend for KubeClient<S> {
    async fn install(&self, chart: &Chart, options: &InstallOptions) -> Result<StoredRelease> {
        KubeClient::install(self, chart, options).await
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<StoredRelease>> {
        KubeClient::list(self, options).await
    }

    async fn uninstall(&self, options: &UninstallOptions) -> Result<StoredRelease> {
        KubeClient::uninstall(self, options).await
    }
}

/// Cluster smoke test
#[derive(Debug, Clone, Default)]
pub struct SmokeTest {
    config: SmokeTestConfig,
}

impl SmokeTest {
    pub fn new(config: SmokeTestConfig) -> Self {
        Self { config }
    }

    /// Run against the cluster named by the configured kubeconfig
    ///
    /// Release records go to the driver selected by `HELM_DRIVER`.
    pub async fn run(&self, chart_path: &Path) -> Result<String> {
        let client = client_from_kubeconfig(&self.config.kubeconfig).await?;
        let driver = Driver::new(DriverKind::from_env()?, client.clone(), StorageConfig::default());
        let backend = KubeClient::with_client(client, driver);

        let release_name = self.config.release_name(Local::now());
        self.run_with(&backend, chart_path, &release_name).await?;
        Ok(release_name)
    }

    /// Run the test steps against `backend`
    ///
    /// Once the install has succeeded the uninstall always runs; if it fails,
    /// its error is returned in place of any verification error.
    pub async fn run_with<B: ReleaseBackend>(
        &self,
        backend: &B,
        chart_path: &Path,
        release_name: &str,
    ) -> Result<()> {
        let chart = ChartSource::from_path(chart_path).load()?;

        let install = InstallOptions::new(release_name, &self.config.namespace)
            .create_namespace()
            .with_timeout(self.config.timeout);
        backend.install(&chart, &install).await?;
        tracing::debug!(release = release_name, "installed");

        let verified = self.verify(backend, release_name).await;

        let uninstall =
            UninstallOptions::new(release_name, &self.config.namespace);
        match backend.uninstall(&uninstall).await {
            Ok(_) => {
                tracing::debug!(release = release_name, "uninstalled");
                verified
            }
            Err(e) => {
                if let Err(verify_err) = &verified {
                    tracing::warn!(error = %verify_err, "verification failed before uninstall");
                }
                Err(match e {
                    KubeError::Uninstall { .. } => e,
                    other => KubeError::Uninstall {
                        name: release_name.to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    async fn verify<B: ReleaseBackend>(&self, backend: &B, release_name: &str) -> Result<()> {
        let options = ListOptions::in_namespace(&self.config.namespace)
            .with_filter(format!("^{}$", regex::escape(release_name)));
        let releases = backend.list(&options).await?;

        match releases.as_slice() {
            [release] if release.status() == "deployed" => Ok(()),
            [release] => Err(KubeError::ReleaseNotDeployed {
                name: release_name.to_string(),
                status: release.status().to_string(),
            }),
            others => Err(KubeError::UnexpectedReleaseCount {
                name: release_name.to_string(),
                found: others.len(),
            }),
        }
    }
}
