//! Core error types

use std::path::PathBuf;

use thiserror::Error;

use crate::lint::LintError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Filesystem access failed before anything was decoded
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot load {file}: {message}")]
    Decode { file: String, message: String },

    #[error("Chart.yaml file is missing")]
    MissingChartFile,

    #[error("invalid chart archive: {message}")]
    Archive { message: String },

    #[error("validation: {message}")]
    InvalidChart { message: String },

    #[error(transparent)]
    Lint(#[from] LintError),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidChart {
            message: message.into(),
        }
    }

    /// Whether this error came from the filesystem rather than the chart contents
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Whether this error was raised while decoding or validating the chart structure
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::MissingChartFile | Self::Archive { .. } | Self::InvalidChart { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
