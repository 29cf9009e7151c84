//! Error types for helmit-kube

use std::path::PathBuf;

use thiserror::Error;

/// Result type for helmit-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be read or turned into a client configuration
    #[error("kubeconfig {}: {message}", path.display())]
    Kubeconfig { path: PathBuf, message: String },

    #[error("release '{name}' not found in namespace '{namespace}'")]
    ReleaseNotFound { name: String, namespace: String },

    #[error("release '{name}' already exists in namespace '{namespace}'")]
    ReleaseAlreadyExists { name: String, namespace: String },

    /// Post-install verification found the wrong number of releases
    #[error("expected exactly one release named '{name}', found {found}")]
    UnexpectedReleaseCount { name: String, found: usize },

    /// Post-install verification found the release in another state
    #[error("release '{name}' is {status}, expected deployed")]
    ReleaseNotDeployed { name: String, status: String },

    #[error("failed to uninstall release '{name}': {message}")]
    Uninstall { name: String, message: String },

    /// A credential initialization stage failed
    #[error("failed to {stage}: {source}")]
    CredentialStage {
        stage: &'static str,
        #[source]
        source: Box<KubeError>,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unknown driver \"{0}\"")]
    UnknownDriver(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("template error: {0}")]
    Template(String),

    /// Chart could not be decoded or failed validation
    #[error(transparent)]
    Chart(#[from] helmit_core::CoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("operation timed out after {0}")]
    Timeout(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<helmit_engine::EngineError> for KubeError {
    fn from(e: helmit_engine::EngineError) -> Self {
        KubeError::Template(e.to_string())
    }
}

impl KubeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> KubeError {
        KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "NotFound".to_string(),
            code,
        }))
    }

    #[test]
    fn test_status_predicates() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(404).is_conflict());
        assert!(api_error(409).is_conflict());
        assert!(!KubeError::Storage("x".into()).is_not_found());
    }

    #[test]
    fn test_verification_messages() {
        let err = KubeError::UnexpectedReleaseCount {
            name: "r".to_string(),
            found: 2,
        };
        assert_eq!(err.to_string(), "expected exactly one release named 'r', found 2");

        let err = KubeError::ReleaseNotDeployed {
            name: "r".to_string(),
            status: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "release 'r' is failed, expected deployed");
    }

    #[test]
    fn test_unknown_driver_message() {
        assert_eq!(
            KubeError::UnknownDriver("etcd".into()).to_string(),
            "unknown driver \"etcd\""
        );
    }
}
