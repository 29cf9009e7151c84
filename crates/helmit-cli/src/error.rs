//! CLI error types with exit code handling
//!
//! Every library error is folded into [`CliError`], which knows its exit code.

use helmit_core::CoreError;
use helmit_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid command line
    #[error("{message}")]
    #[diagnostic(code(helmit::cli::usage), help("run `helmit --help` for usage"))]
    Usage { message: String },

    /// Chart decoded but failed lint
    #[error("{message}")]
    #[diagnostic(code(helmit::cli::lint))]
    Lint { message: String },

    /// Chart could not be decoded or is structurally invalid
    #[error("{message}")]
    #[diagnostic(code(helmit::cli::chart))]
    Chart { message: String },

    #[error("{message}")]
    #[diagnostic(code(helmit::cli::template))]
    Template { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("{message}")]
    #[diagnostic(code(helmit::cli::io))]
    Io { message: String },

    /// Kubeconfig, API or release verification failure
    #[error("{message}")]
    #[diagnostic(code(helmit::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(helmit::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Lint { .. } => exit_codes::LINT_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    fn cluster(message: String) -> Self {
        Self::Cluster {
            message,
            help: None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Io { .. } => CliError::Io { message },
            CoreError::Lint(_) => CliError::Lint { message },
            _ => CliError::Chart { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Chart(core) => core.into(),
            KubeError::Template(message) => CliError::Template { message },
            KubeError::Kubeconfig { .. } => CliError::Cluster {
                message: err.to_string(),
                help: Some("check the kubeconfig path and its current context".to_string()),
            },
            KubeError::UnknownDriver(_) => CliError::Cluster {
                message: err.to_string(),
                help: Some("HELM_DRIVER must be one of secret, configmap or memory".to_string()),
            },
            other => CliError::cluster(other.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
