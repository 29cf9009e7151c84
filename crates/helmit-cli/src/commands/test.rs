//! Test command - install, verify and uninstall a chart in a cluster

use std::path::Path;

use helmit_kube::{SmokeTest, SmokeTestConfig};

use crate::error::Result;

pub async fn run(chart_path: &Path, kubeconfig: &Path) -> Result<()> {
    let config = SmokeTestConfig {
        kubeconfig: kubeconfig.to_path_buf(),
        ..Default::default()
    };

    let release = SmokeTest::new(config).run(chart_path).await?;
    tracing::info!(release = %release, "smoke test passed");

    println!("Chart tested successfully.");
    Ok(())
}
