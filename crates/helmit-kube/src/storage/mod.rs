//! Storage drivers for persisting release information
//!
//! The driver is chosen with `HELM_DRIVER`:
//! - **Secrets** (default): one Secret per release revision
//! - **ConfigMaps**: one ConfigMap per release revision
//! - **Memory**: kept in-process for the lifetime of the driver
//!
//! Records are JSON, compressed, then base64 encoded.

mod configmap;
mod memory;
mod secrets;

pub use configmap::ConfigMapDriver;
pub use memory::MemoryDriver;
pub use secrets::SecretsDriver;

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kube::Client;

use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// Environment variable selecting the storage driver
pub const DRIVER_ENV: &str = "HELM_DRIVER";

/// Label keys stamped on every storage object
pub const OWNER_LABEL: &str = "owner";
pub const OWNER_VALUE: &str = "helmit";
pub const NAME_LABEL: &str = "name";
pub const VERSION_LABEL: &str = "version";
pub const STATUS_LABEL: &str = "status";
pub const COMPRESSION_LABEL: &str = "helmit.io/compression";

/// Data key holding the encoded release
pub const RELEASE_KEY: &str = "release";

/// Storage driver trait for release persistence
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Get a specific release revision
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease>;

    /// List releases, optionally filtered by namespace and/or exact name
    ///
    /// Results are ordered newest revision first.
    async fn list(&self, namespace: Option<&str>, name: Option<&str>)
    -> Result<Vec<StoredRelease>>;

    /// Persist a new release revision
    async fn create(&self, release: &StoredRelease) -> Result<()>;

    /// Replace an existing release revision
    async fn update(&self, release: &StoredRelease) -> Result<()>;

    /// Remove every revision of a release, returning what was removed
    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>>;

    /// All revisions of a release, newest first
    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.list(Some(namespace), Some(name)).await?;
        if releases.is_empty() {
            return Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Ok(releases)
    }

    /// Latest revision of a release
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        let mut history = self.history(namespace, name).await?;
        Ok(history.remove(0))
    }
}

/// Which backend stores release records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    #[default]
    Secrets,
    ConfigMaps,
    Memory,
}

impl FromStr for DriverKind {
    type Err = KubeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "secret" | "secrets" => Ok(Self::Secrets),
            "configmap" | "configmaps" => Ok(Self::ConfigMaps),
            "memory" => Ok(Self::Memory),
            other => Err(KubeError::UnknownDriver(other.to_string())),
        }
    }
}

impl DriverKind {
    /// Read `HELM_DRIVER`; unset means the default driver
    pub fn from_env() -> Result<Self> {
        std::env::var(DRIVER_ENV).unwrap_or_default().parse()
    }
}

/// Runtime-selected driver
pub enum Driver {
    Secrets(SecretsDriver),
    ConfigMaps(ConfigMapDriver),
    Memory(MemoryDriver),
}

impl Driver {
    pub fn new(kind: DriverKind, client: Client, config: StorageConfig) -> Self {
        tracing::debug!(driver = ?kind, "using release storage driver");
        match kind {
            DriverKind::Secrets => Self::Secrets(SecretsDriver::with_client(client, config)),
            DriverKind::ConfigMaps => Self::ConfigMaps(ConfigMapDriver::with_client(client, config)),
            DriverKind::Memory => Self::Memory(MemoryDriver::new()),
        }
    }

    fn inner(&self) -> &dyn StorageDriver {
        match self {
            Self::Secrets(d) => d,
            Self::ConfigMaps(d) => d,
            Self::Memory(d) => d,
        }
    }
}

#[async_trait]
impl StorageDriver for Driver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        self.inner().get(namespace, name, version).await
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<StoredRelease>> {
        self.inner().list(namespace, name).await
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        self.inner().create(release).await
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        self.inner().update(release).await
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        self.inner().delete_all(namespace, name).await
    }
}

/// Storage configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageConfig {
    pub compression: CompressionMethod,
}

/// Compression method for release data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Gzip { level: u32 },
    Zstd { level: i32 },
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Zstd { level: 3 }
    }
}

impl CompressionMethod {
    /// Value of the compression label
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip { .. } => "gzip",
            Self::Zstd { .. } => "zstd",
        }
    }

    /// Parse a compression label, using default levels
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "none" => Some(Self::None),
            "gzip" => Some(Self::Gzip { level: 6 }),
            "zstd" => Some(Self::Zstd { level: 3 }),
            _ => None,
        }
    }
}

pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { level } => {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(data)
                .and_then(|()| encoder.finish())
                .map_err(|e| KubeError::Compression(e.to_string()))
        }
        CompressionMethod::Zstd { level } => {
            zstd::encode_all(data, level).map_err(|e| KubeError::Compression(e.to_string()))
        }
    }
}

pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { .. } => {
            use std::io::Read;
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| KubeError::Compression(e.to_string()))?;
            Ok(out)
        }
        CompressionMethod::Zstd { .. } => {
            zstd::decode_all(data).map_err(|e| KubeError::Compression(e.to_string()))
        }
    }
}

/// Serialize, compress and base64 encode a release
pub fn encode_release(release: &StoredRelease, compression: CompressionMethod) -> Result<String> {
    let json = serde_json::to_vec(release)?;
    Ok(STANDARD.encode(compress(&json, compression)?))
}

/// Inverse of [`encode_release`]
pub fn decode_release(data: &str, compression: CompressionMethod) -> Result<StoredRelease> {
    let raw = STANDARD
        .decode(data.trim())
        .map_err(|e| KubeError::Serialization(format!("base64 decode error: {e}")))?;
    Ok(serde_json::from_slice(&decompress(&raw, compression)?)?)
}

/// Labels applied to every storage object
pub fn storage_labels(release: &StoredRelease, compression: CompressionMethod) -> BTreeMap<String, String> {
    BTreeMap::from([
        (OWNER_LABEL.to_string(), OWNER_VALUE.to_string()),
        (NAME_LABEL.to_string(), release.name.clone()),
        (VERSION_LABEL.to_string(), release.version.to_string()),
        (STATUS_LABEL.to_string(), release.status().to_string()),
        (COMPRESSION_LABEL.to_string(), compression.label().to_string()),
    ])
}

/// Label selector matching helmit records, optionally for one release name
pub fn label_selector(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{OWNER_LABEL}={OWNER_VALUE},{NAME_LABEL}={name}"),
        None => format!("{OWNER_LABEL}={OWNER_VALUE}"),
    }
}

/// Compression recorded on a storage object, falling back to the configured one
pub(crate) fn compression_of(
    labels: Option<&BTreeMap<String, String>>,
    fallback: CompressionMethod,
) -> CompressionMethod {
    labels
        .and_then(|l| l.get(COMPRESSION_LABEL))
        .and_then(|c| CompressionMethod::from_label(c))
        .unwrap_or(fallback)
}

/// Newest revision first
pub(crate) fn sort_newest_first(releases: &mut [StoredRelease]) {
    releases.sort_by(|a, b| {
        (a.namespace.as_str(), a.name.as_str(), std::cmp::Reverse(a.version)).cmp(&(
            b.namespace.as_str(),
            b.name.as_str(),
            std::cmp::Reverse(b.version),
        ))
    });
}
