//! Stored release records and their lifecycle states

use chrono::{DateTime, Duration, Utc};
use helmit_core::{ChartMetadata, Values};
use serde::{Deserialize, Serialize};

/// Default timeout for pending operations (5 minutes)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::minutes(5);

/// A release as persisted by a storage driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelease {
    pub name: String,

    pub namespace: String,

    /// Revision number (1-indexed)
    pub version: u32,

    pub state: ReleaseState,

    /// Chart metadata at install time
    pub chart: ChartMetadata,

    /// Effective values the manifest was rendered with
    pub values: Values,

    /// Rendered manifest (all Kubernetes resources)
    pub manifest: String,

    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl StoredRelease {
    /// Create a first revision, pending install
    pub fn for_install(
        name: String,
        namespace: String,
        chart: ChartMetadata,
        values: Values,
        manifest: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            name,
            namespace,
            version: 1,
            state: ReleaseState::PendingInstall {
                started_at: now,
                timeout: DEFAULT_OPERATION_TIMEOUT,
            },
            chart,
            values,
            manifest,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key for this release
    pub fn storage_key(&self) -> String {
        storage_key(&self.name, self.version)
    }

    /// Lowercase status name (`deployed`, `pending-install`, ...)
    pub fn status(&self) -> &'static str {
        self.state.status_name()
    }

    pub fn mark_deployed(&mut self) {
        self.set_state(ReleaseState::Deployed);
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.set_state(ReleaseState::Failed {
            reason,
            failed_at: Utc::now(),
        });
    }

    pub fn mark_uninstalling(&mut self) {
        self.set_state(ReleaseState::PendingUninstall {
            started_at: Utc::now(),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        });
    }

    pub fn mark_uninstalled(&mut self) {
        self.set_state(ReleaseState::Uninstalled);
    }

    fn set_state(&mut self, state: ReleaseState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

/// Name of the storage object holding a release revision
pub fn storage_key(name: &str, version: u32) -> String {
    format!("sh.helmit.release.v1.{name}.v{version}")
}

/// Release state with timing information for pending operations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ReleaseState {
    #[default]
    Deployed,

    Failed {
        reason: String,
        failed_at: DateTime<Utc>,
    },

    Uninstalled,

    PendingInstall {
        started_at: DateTime<Utc>,
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },

    PendingUninstall {
        started_at: DateTime<Utc>,
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },
}

impl ReleaseState {
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Failed { .. } => "failed",
            Self::Uninstalled => "uninstalled",
            Self::PendingInstall { .. } => "pending-install",
            Self::PendingUninstall { .. } => "pending-uninstall",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { reason, .. } => write!(f, "failed: {reason}"),
            other => f.write_str(other.status_name()),
        }
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: &str) -> StoredRelease {
        StoredRelease::for_install(
            name.to_string(),
            "default".to_string(),
            ChartMetadata {
                name: "web".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
            Values::new(),
            "apiVersion: v1\nkind: ConfigMap".to_string(),
        )
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(release("myapp").storage_key(), "sh.helmit.release.v1.myapp.v1");
    }

    #[test]
    fn test_lifecycle() {
        let mut r = release("myapp");
        assert_eq!(r.status(), "pending-install");

        r.mark_deployed();
        assert_eq!(r.status(), "deployed");

        r.mark_uninstalling();
        assert_eq!(r.status(), "pending-uninstall");

        r.mark_uninstalled();
        assert_eq!(r.state.to_string(), "uninstalled");

        r.mark_failed("boom".to_string());
        assert_eq!(r.state.to_string(), "failed: boom");
    }

    #[test]
    fn test_state_serialized_with_status_tag() {
        let json = serde_json::to_value(ReleaseState::Uninstalled).unwrap();
        assert_eq!(json["status"], "uninstalled");

        let r = release("x");
        let back: StoredRelease = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back.state, r.state);
        assert_eq!(back.chart.name, "web");
    }
}
