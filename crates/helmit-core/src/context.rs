//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chart::ChartMetadata;
use crate::values::Values;

/// Value of `release.service` in every rendered template
pub const RELEASE_SERVICE: &str = "Helmit";

/// Context available to all templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Chart defaults merged with any overrides
    pub values: JsonValue,

    pub release: ReleaseInfo,

    pub chart: ChartInfo,

    pub capabilities: Capabilities,
}

/// Release information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub is_install: bool,
    pub is_upgrade: bool,
    pub service: String,
}

impl ReleaseInfo {
    /// Release info for a first install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: RELEASE_SERVICE.to_string(),
        }
    }
}

/// Chart information for templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
    pub description: String,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(meta: &ChartMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version.clone(),
            app_version: meta.app_version.clone(),
            description: meta.description.clone(),
        }
    }
}

/// Cluster capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub kube_version: String,
    pub api_versions: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        // Matches the k8s-openapi feature the workspace compiles against
        Self {
            kube_version: "v1.31.0".to_string(),
            api_versions: ["v1", "apps/v1", "batch/v1", "networking.k8s.io/v1"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TemplateContext {
    pub fn new(values: Values, release: ReleaseInfo, chart: &ChartMetadata) -> Self {
        Self {
            values: values.into_inner(),
            release,
            chart: ChartInfo::from(chart),
            capabilities: Capabilities::default(),
        }
    }
}
