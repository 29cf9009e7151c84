//! Action options for install, list and uninstall operations

use std::time::Duration;

use helmit_core::Values;
use regex::Regex;

use crate::error::{KubeError, Result};

/// Default timeout for applying a release
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Options for install operation
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Create namespace if it doesn't exist
    pub create_namespace: bool,

    /// Upper bound for applying the manifest
    pub timeout: Duration,

    /// Values merged over the chart's defaults
    pub values: Values,
}

impl InstallOptions {
    /// Create default install options with name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            create_namespace: false,
            timeout: DEFAULT_INSTALL_TIMEOUT,
            values: Values::new(),
        }
    }

    pub fn create_namespace(mut self) -> Self {
        self.create_namespace = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }
}

/// Options for uninstall operation
#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub name: String,

    pub namespace: String,

    /// Upper bound for deleting the release's resources
    pub timeout: Duration,
}

impl UninstallOptions {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

/// Options for listing releases
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Restrict to one namespace; `None` lists every namespace
    pub namespace: Option<String>,

    /// Regular expression matched against release names
    pub filter: Option<String>,
}

impl ListOptions {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Compile the name filter
    pub fn matcher(&self) -> Result<Option<Regex>> {
        self.filter
            .as_deref()
            .map(|f| {
                Regex::new(f).map_err(|e| KubeError::InvalidConfig(format!("invalid filter: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_options_builder() {
        let opts = InstallOptions::new("myapp", "prod")
            .create_namespace()
            .with_timeout(Duration::from_secs(30));

        assert_eq!(opts.name, "myapp");
        assert_eq!(opts.namespace, "prod");
        assert!(opts.create_namespace);
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert!(opts.values.is_empty());
    }

    #[test]
    fn test_install_options_defaults() {
        let opts = InstallOptions::new("myapp", "default");
        assert!(!opts.create_namespace);
        assert_eq!(opts.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_list_matcher() {
        let opts = ListOptions::in_namespace("default").with_filter("^web-");
        let re = opts.matcher().unwrap().unwrap();
        assert!(re.is_match("web-frontend"));
        assert!(!re.is_match("api"));

        assert!(ListOptions::default().matcher().unwrap().is_none());
        assert!(ListOptions::default().with_filter("(").matcher().is_err());
    }
}
