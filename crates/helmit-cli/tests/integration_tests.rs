//! Integration tests for the helmit binary

use std::process::Command;

/// Helper to run helmit command
fn helmit(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_helmit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute helmit")
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

mod usage {
    use super::*;

    #[test]
    fn test_no_arguments_prints_usage() {
        let output = helmit(&[]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("Usage: helmit [flags]"));
    }

    #[test]
    fn test_help_flags() {
        for flag in ["-h", "--help", "-help"] {
            let output = helmit(&[flag]);
            assert!(output.status.success(), "{flag} should succeed");
            assert!(stdout(&output).contains("--inittestenv string"));
        }
    }

    #[test]
    fn test_help_wins_over_other_flags() {
        let output = helmit(&["--chart", "does-not-exist", "--test", "-h"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("Usage: helmit [flags]"));
        assert!(stderr(&output).is_empty());
    }

    #[test]
    fn test_positional_arguments_print_usage() {
        let output = helmit(&["foo"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("Usage: helmit [flags]"));
        assert!(stderr(&output).is_empty());
    }

    #[test]
    fn test_explicit_help_value() {
        let output = helmit(&["-help=true"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("Usage: helmit [flags]"));
    }

    #[test]
    fn test_unknown_flag_fails() {
        let output = helmit(&["--bogus"]);
        assert_eq!(output.status.code(), Some(64));
        let err = stderr(&output);
        assert!(err.contains("Error:"));
        assert!(err.contains("--bogus"));
        assert!(!err.contains("error: "), "{err}");
    }
}

mod load_command {
    use super::*;

    #[test]
    fn test_prints_chart_details() {
        let chart = format!("{}/demo-chart", fixtures_path());
        let output = helmit(&["--chart", &chart]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert_eq!(
            stdout(&output),
            "Chart Name: demo-chart\n\
             Chart Description: A small chart used by the CLI tests\n\
             Chart Version: 0.3.1\n"
        );
    }

    #[test]
    fn test_single_dash_spelling() {
        let chart = format!("{}/demo-chart", fixtures_path());
        let output = helmit(&["-chart", &chart]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("Chart Name: demo-chart"));

        let output = helmit(&[&format!("-chart={chart}")]);
        assert!(output.status.success());
    }

    #[test]
    fn test_explicit_bool_values() {
        let chart = format!("{}/demo-chart", fixtures_path());
        let output = helmit(&["-test=false", "-chart", &chart]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("Chart Name: demo-chart"));
    }

    #[test]
    fn test_nonexistent_chart() {
        let output = helmit(&["-chart", "non-existent-chart"]);

        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(5));
        assert!(
            stderr(&output)
                .to_lowercase()
                .contains("no such file or directory")
        );
        assert!(stdout(&output).is_empty());
    }

    #[test]
    fn test_chart_without_templates_fails_lint() {
        let chart = format!("{}/no-templates", fixtures_path());
        let output = helmit(&["--chart", &chart]);

        assert_eq!(output.status.code(), Some(2));
        assert!(stderr(&output).contains("chart has no templates"));
    }

    #[test]
    fn test_garbage_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.tgz");
        std::fs::write(&path, b"definitely not gzip").unwrap();

        let output = helmit(&["--chart", path.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(4));
        assert!(!stderr(&output).contains("chart has no"));
    }

    #[test]
    fn test_missing_chart_path() {
        let output = helmit(&["--test"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("chart path must be specified"));
    }
}

mod cluster_commands {
    use super::*;

    #[test]
    fn test_smoke_test_with_missing_kubeconfig() {
        let chart = format!("{}/demo-chart", fixtures_path());
        let output = Command::new(env!("CARGO_BIN_EXE_helmit"))
            .args(["--chart", &chart, "--test"])
            .env("HELMIT_KUBECONFIG", "/nonexistent/helmit/kubeconfig")
            .output()
            .expect("Failed to execute helmit");

        assert_eq!(output.status.code(), Some(6));
        let err = stderr(&output);
        assert!(err.contains("/nonexistent/helmit/kubeconfig"));
        assert!(!stdout(&output).contains("Chart tested successfully."));
    }

    #[test]
    fn test_smoke_test_accepts_explicit_true() {
        let chart = format!("{}/demo-chart", fixtures_path());
        let output = Command::new(env!("CARGO_BIN_EXE_helmit"))
            .args(["-test=true", "--chart", &chart])
            .env("HELMIT_KUBECONFIG", "/nonexistent/helmit/kubeconfig")
            .output()
            .expect("Failed to execute helmit");

        // parsed as --test, so it reaches the kubeconfig
        assert_eq!(output.status.code(), Some(6));
        assert!(stderr(&output).contains("/nonexistent/helmit/kubeconfig"));
    }

    #[test]
    fn test_init_test_env_last_failure_wins() {
        let dir = tempfile::tempdir().unwrap();
        let output = Command::new(env!("CARGO_BIN_EXE_helmit"))
            .args(["--inittestenv", "/nonexistent/helmit/kubeconfig"])
            .env("HELMIT_KUBECONFIG_DIR", dir.path())
            .env("HELMIT_STAGE_POLICY", "last-failure-wins")
            .output()
            .expect("Failed to execute helmit");

        assert!(!output.status.success());
        assert!(stderr(&output).contains("failed to read kubeconfig file"));
    }

    #[test]
    fn test_init_test_env_with_missing_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let output = Command::new(env!("CARGO_BIN_EXE_helmit"))
            .args(["--inittestenv", "/nonexistent/helmit/kubeconfig"])
            .env("HELMIT_KUBECONFIG_DIR", dir.path())
            .output()
            .expect("Failed to execute helmit");

        assert!(!output.status.success());
        assert!(stderr(&output).contains("failed to build kubeconfig"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
