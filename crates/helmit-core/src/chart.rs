//! Chart definition and decoder-level validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::values::Values;

/// Chart API version assumed when `Chart.yaml` omits one
pub const API_VERSION_V1: &str = "v1";

/// Chart API version used by current charts
pub const API_VERSION_V2: &str = "v2";

/// A decoded chart
#[derive(Debug, Clone, Default)]
pub struct Chart {
    /// Contents of `Chart.yaml`
    pub metadata: Option<ChartMetadata>,

    /// Files under `templates/`, named relative to that directory
    pub templates: Vec<ChartFile>,

    /// Default values from `values.yaml`
    pub values: Values,

    /// Raw `values.schema.json`, if the chart ships one
    pub schema: Option<Vec<u8>>,

    /// Every other file in the chart
    pub files: Vec<ChartFile>,
}

/// A named file inside a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl ChartFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// File contents as text, replacing invalid UTF-8
    pub fn contents(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Chart metadata as found in `Chart.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub name: String,

    /// Chart version (SemVer, checked by [`Chart::validate`])
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    /// `application` or `library`; empty means application
    #[serde(default, rename = "type")]
    pub chart_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    #[serde(default)]
    pub deprecated: bool,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl ChartMetadata {
    /// Whether this is a library chart (not installable)
    pub fn is_library(&self) -> bool {
        self.chart_type == "library"
    }
}

/// Maintainer information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Declared chart dependency
///
/// Dependencies are recorded and validated but never resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Chart {
    /// Chart name, or an empty string when metadata is missing
    pub fn name(&self) -> &str {
        self.metadata.as_ref().map(|m| m.name.as_str()).unwrap_or_default()
    }

    /// Structural validation of the decoded chart
    ///
    /// Mirrors the checks every chart must pass before it is used, independently
    /// of the local lint rules in [`crate::lint`].
    pub fn validate(&self) -> Result<()> {
        let Some(meta) = &self.metadata else {
            return Err(CoreError::invalid("chart.metadata is required"));
        };

        if meta.api_version.is_empty() {
            return Err(CoreError::invalid("chart.metadata.apiVersion is required"));
        }

        if meta.name.is_empty() {
            return Err(CoreError::invalid("chart.metadata.name is required"));
        }
        if meta.name.contains(['/', '\\']) || meta.name == "." || meta.name == ".." {
            return Err(CoreError::invalid(format!(
                "chart.metadata.name {:?} is invalid",
                meta.name
            )));
        }

        if meta.version.is_empty() {
            return Err(CoreError::invalid("chart.metadata.version is required"));
        }
        if semver::Version::parse(meta.version.trim_start_matches('v')).is_err() {
            return Err(CoreError::invalid(format!(
                "chart.metadata.version {:?} is invalid",
                meta.version
            )));
        }

        if !matches!(meta.chart_type.as_str(), "" | "application" | "library") {
            return Err(CoreError::invalid(
                "chart.metadata.type must be application or library",
            ));
        }

        for dep in &meta.dependencies {
            if dep.name.is_empty() {
                return Err(CoreError::invalid("dependencies must have a name"));
            }
            if let Some(alias) = &dep.alias
                && !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(CoreError::invalid(format!(
                    "dependency {:?} has disallowed characters in the alias",
                    dep.name
                )));
            }
        }

        Ok(())
    }
}

/// `version: 1.0` in YAML is a float; keep the literal text
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(serde::de::Error::custom("version must be a string")),
    }
}
