//! Building API clients from kubeconfig files

use std::path::Path;

use kube::Client;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};

use crate::error::{KubeError, Result};

/// Default kubeconfig used by the smoke test
pub const DEFAULT_KUBECONFIG: &str = "/tmp/helmit_kubeconfig";

/// Read a kubeconfig file and resolve its current context
pub async fn load_config(path: &Path) -> Result<Config> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| KubeError::Kubeconfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| KubeError::Kubeconfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Build an API client from a kubeconfig file
///
/// No request is made; an unreachable cluster surfaces on first use.
pub async fn client_from_kubeconfig(path: &Path) -> Result<Client> {
    let config = load_config(path).await?;
    tracing::debug!(kubeconfig = %path.display(), cluster = %config.cluster_url, "built client configuration");

    Client::try_from(config).map_err(|e| KubeError::Kubeconfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: local
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: local
  context:
    cluster: local
    user: admin
    namespace: apps
current-context: local
users:
- name: admin
  user:
    token: abc123
"#;

    #[tokio::test]
    async fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.cluster_url.host(), Some("127.0.0.1"));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
        assert_eq!(config.default_namespace, "apps");
    }

    #[tokio::test]
    async fn test_missing_kubeconfig() {
        let err = load_config(Path::new("/nonexistent/helmit/kubeconfig"))
            .await
            .unwrap_err();
        match err {
            KubeError::Kubeconfig { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/helmit/kubeconfig"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, "clusters: [[[").unwrap();

        assert!(matches!(
            client_from_kubeconfig(&path).await,
            Err(KubeError::Kubeconfig { .. })
        ));
    }
}
