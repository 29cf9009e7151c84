//! Helmit Kube - Kubernetes integration for helmit
//!
//! This crate provides:
//! - **Client configuration**: build API clients from kubeconfig files
//! - **Storage Drivers**: persist release records in Secrets, ConfigMaps or memory (`HELM_DRIVER`)
//! - **Release Management**: install, list and uninstall charts
//! - **Smoke Test**: install a chart, check it deployed, remove it again
//! - **Credentials**: verify a kubeconfig and keep a private copy

pub mod actions;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod release;
pub mod resources;
pub mod smoke;
pub mod storage;

pub use actions::{InstallOptions, ListOptions, UninstallOptions};
pub use client::KubeClient;
pub use config::{DEFAULT_KUBECONFIG, client_from_kubeconfig};
pub use credentials::{
    ClusterAccess, CredentialConfig, CredentialInitializer, KubeAccess, StagePolicy,
};
pub use error::{KubeError, Result};
pub use release::{ReleaseState, StoredRelease};
pub use resources::{OperationSummary, ResourceManager};
pub use smoke::{ChartSource, ReleaseBackend, SmokeTest, SmokeTestConfig};
pub use storage::{
    CompressionMethod, Driver, DriverKind, MemoryDriver, StorageConfig, StorageDriver,
};
