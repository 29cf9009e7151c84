//! Verify a kubeconfig and keep a private copy of it
//!
//! The credential is checked by building a client and listing namespaces,
//! then copied byte for byte to `<dir>/kubeconfig-<YYYYMMDD-HHMMSS>` with
//! owner-only permissions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams};

use crate::config::client_from_kubeconfig;
use crate::error::{KubeError, Result};

/// Default directory for copied kubeconfigs
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp";

const FILE_PREFIX: &str = "kubeconfig-";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const STAGE_CONFIG: &str = "build kubeconfig";
const STAGE_LIST: &str = "list namespaces";
const STAGE_READ: &str = "read kubeconfig file";
const STAGE_WRITE: &str = "write kubeconfig to temp file";

/// What to do when a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagePolicy {
    /// Stop at the first failing stage
    #[default]
    FailFast,
    /// Run every stage; only the last failure is reported
    LastFailureWins,
}

impl std::fmt::Display for StagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::LastFailureWins => write!(f, "last-failure-wins"),
        }
    }
}

impl std::str::FromStr for StagePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "last-failure-wins" => Ok(Self::LastFailureWins),
            _ => Err(format!(
                "unknown stage policy: {s} (expected fail-fast or last-failure-wins)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub policy: StagePolicy,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: FILE_PREFIX.to_string(),
            policy: StagePolicy::default(),
        }
    }
}

impl CredentialConfig {
    /// Destination for a copy made at `now`
    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", self.file_prefix, now.format(TIMESTAMP_FORMAT)))
    }
}

/// Connectivity check against the cluster a kubeconfig points at
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    type Client: Send + Sync;

    /// Build a client from the kubeconfig
    async fn connect(&self, kubeconfig: &Path) -> Result<Self::Client>;

    /// Names of all namespaces visible to the client
    async fn list_namespaces(&self, client: &Self::Client) -> Result<Vec<String>>;
}

/// Access backed by the Kubernetes API
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeAccess;

#[async_trait]
impl ClusterAccess for KubeAccess {
    type Client = kube::Client;

    async fn connect(&self, kubeconfig: &Path) -> Result<kube::Client> {
        client_from_kubeconfig(kubeconfig).await
    }

    async fn list_namespaces(&self, client: &kube::Client) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }
}

pub struct CredentialInitializer<P: ClusterAccess = KubeAccess> {
    config: CredentialConfig,
    cluster: P,
}

impl CredentialInitializer<KubeAccess> {
    pub fn new(config: CredentialConfig) -> Self {
        Self::with_cluster(config, KubeAccess)
    }
}

impl<P: ClusterAccess> CredentialInitializer<P> {
    pub fn with_cluster(config: CredentialConfig, cluster: P) -> Self {
        Self { config, cluster }
    }

    /// Verify `kubeconfig` and copy it, returning the written path
    pub async fn run(&self, kubeconfig: &Path) -> Result<PathBuf> {
        self.run_at(kubeconfig, Local::now()).await
    }

    pub async fn run_at(&self, kubeconfig: &Path, now: DateTime<Local>) -> Result<PathBuf> {
        let mut stages = Stages::new(self.config.policy);

        let client = stages.record(STAGE_CONFIG, self.cluster.connect(kubeconfig).await)?;

        match &client {
            Some(client) => {
                if let Some(namespaces) =
                    stages.record(STAGE_LIST, self.cluster.list_namespaces(client).await)?
                {
                    tracing::debug!(count = namespaces.len(), "cluster reachable");
                }
            }
            None => tracing::debug!("no client, skipping namespace listing"),
        }

        let read = std::fs::read(kubeconfig).map_err(|e| KubeError::io(kubeconfig, e));
        let bytes = stages.record(STAGE_READ, read)?.unwrap_or_default();

        let path = self.config.output_path(now);
        stages.record(STAGE_WRITE, write_private(&path, &bytes))?;

        stages.finish()?;
        tracing::info!(path = %path.display(), "copied kubeconfig");
        Ok(path)
    }
}

/// Error bookkeeping across stages under a [`StagePolicy`]
struct Stages {
    policy: StagePolicy,
    last_error: Option<KubeError>,
}

impl Stages {
    fn new(policy: StagePolicy) -> Self {
        Self {
            policy,
            last_error: None,
        }
    }

    /// `Err` stops the run; `Ok(None)` means the stage failed but the run continues
    fn record<T>(&mut self, stage: &'static str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let err = KubeError::CredentialStage {
                    stage,
                    source: Box::new(e),
                };
                match self.policy {
                    StagePolicy::FailFast => Err(err),
                    StagePolicy::LastFailureWins => {
                        tracing::warn!(error = %err, "stage failed, continuing");
                        self.last_error = Some(err);
                        Ok(None)
                    }
                }
            }
        }
    }

    fn finish(self) -> Result<()> {
        self.last_error.map_or(Ok(()), Err)
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o600);
        let mut file = options.open(path).map_err(|e| KubeError::io(path, e))?;
        // mode() only applies to newly created files
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .and_then(|()| file.write_all(bytes))
            .map_err(|e| KubeError::io(path, e))
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, bytes).map_err(|e| KubeError::io(path, e))
    }
}
