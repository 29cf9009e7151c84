//! Init-test-env command - verify a kubeconfig and store a private copy

use std::path::Path;

use helmit_kube::{CredentialConfig, CredentialInitializer, StagePolicy};

use crate::error::Result;

pub async fn run(kubeconfig: &Path, output_dir: &Path, policy: StagePolicy) -> Result<()> {
    let config = CredentialConfig {
        output_dir: output_dir.to_path_buf(),
        policy,
        ..Default::default()
    };

    let written = CredentialInitializer::new(config).run(kubeconfig).await?;
    println!("Successfully wrote kubeconfig to {}", written.display());
    println!("Test environment initialized.");

    Ok(())
}
