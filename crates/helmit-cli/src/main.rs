//! helmit CLI - load, validate and smoke-test Helm charts

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use console::style;
use helmit_kube::StagePolicy;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use error::{CliError, Result};

const USAGE: &str = "
Usage: helmit [flags]
Flags:
  -c, --chart string          Path to the Helm chart
  -h, --help                  Output usage information
      --inittestenv string    Initialize a test environment with the given kubeconfig file
  -t, --test                  Test the Helm chart after loading

Environment:
  HELMIT_KUBECONFIG           Kubeconfig used by --test (default /tmp/helmit_kubeconfig)
  HELMIT_KUBECONFIG_DIR       Directory written by --inittestenv (default /tmp)
  HELMIT_STAGE_POLICY         --inittestenv failure handling: fail-fast or last-failure-wins
  HELM_DRIVER                 Release storage: secret, configmap or memory
  RUST_LOG                    Log filter (default warn)
";

/// Long flags that may also be spelled with a single dash
const LONG_FLAGS: &[&str] = &[
    "chart",
    "help",
    "inittestenv",
    "test",
    "kubeconfig",
    "kubeconfig-dir",
    "stage-policy",
    "version",
];

/// Boolean flags that accept an explicit `=true` / `=false` value
const BOOL_FLAGS: &[&str] = &["help", "h", "test", "t"];

#[derive(Parser, Debug)]
#[command(name = "helmit")]
#[command(version)]
#[command(about = "Load, validate and smoke-test Helm charts", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Path to the Helm chart
    #[arg(short = 'c', long = "chart", value_name = "PATH")]
    chart: Option<PathBuf>,

    /// Initialize a test environment with the given kubeconfig file
    #[arg(long = "inittestenv", value_name = "KUBECONFIG")]
    init_test_env: Option<PathBuf>,

    /// Test the Helm chart after loading
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Kubeconfig used by --test
    #[arg(
        long,
        env = "HELMIT_KUBECONFIG",
        default_value = helmit_kube::DEFAULT_KUBECONFIG,
        hide = true
    )]
    kubeconfig: PathBuf,

    /// Directory the initialized kubeconfig is written to
    #[arg(
        long = "kubeconfig-dir",
        env = "HELMIT_KUBECONFIG_DIR",
        default_value = helmit_kube::credentials::DEFAULT_OUTPUT_DIR,
        hide = true
    )]
    kubeconfig_dir: PathBuf,

    /// How --inittestenv reports failing stages
    #[arg(
        long = "stage-policy",
        env = "HELMIT_STAGE_POLICY",
        default_value = "fail-fast",
        hide = true
    )]
    stage_policy: StagePolicy,
}

fn main() -> ExitCode {
    init_logging();

    match run(normalize_args(std::env::args_os())) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            report(&err);
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn run(args: Vec<OsString>) -> Result<()> {
    if !has_flags(&args) || wants_help(&args) {
        println!("{USAGE}");
        return Ok(());
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => {
            print!("{e}");
            return Ok(());
        }
        Err(e) => return Err(CliError::usage(clap_message(&e))),
    };

    if let Some(kubeconfig) = &cli.init_test_env {
        return block_on(commands::init_test_env::run(
            kubeconfig,
            &cli.kubeconfig_dir,
            cli.stage_policy,
        ));
    }

    let chart = cli
        .chart
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| CliError::usage("chart path must be specified"))?;

    if cli.test {
        return block_on(commands::test::run(chart, &cli.kubeconfig));
    }

    commands::show::run(chart)
}

/// Rewrite `-chart`, `-test=true` style flags to their `--` form
///
/// Explicit boolean values are folded away: `-test=true` becomes `--test`
/// and `-test=false` is dropped.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut terminated = false;
    args.into_iter()
        .enumerate()
        .filter_map(|(i, arg)| {
            if i == 0 || terminated {
                return Some(arg);
            }
            let Some(s) = arg.to_str() else {
                return Some(arg);
            };
            if s == "--" {
                terminated = true;
                return Some(arg);
            }
            let Some(rest) = s.strip_prefix('-') else {
                return Some(arg);
            };
            let (dashes, rest) = match rest.strip_prefix('-') {
                Some(long) => ("--", long),
                None => ("-", rest),
            };
            let (name, value) = match rest.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (rest, None),
            };

            if BOOL_FLAGS.contains(&name)
                && let Some(enabled) = value.and_then(parse_bool)
            {
                if !enabled {
                    return None;
                }
                let dashes = if name.len() == 1 { "-" } else { "--" };
                return Some(OsString::from(format!("{dashes}{name}")));
            }

            if dashes == "-" && LONG_FLAGS.contains(&name) {
                return Some(OsString::from(format!("-{s}")));
            }
            Some(arg)
        })
        .collect()
}

/// Boolean spellings accepted after `=`
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Whether any argument before `--` looks like a flag
fn has_flags(args: &[OsString]) -> bool {
    args.iter()
        .skip(1)
        .take_while(|a| *a != "--")
        .filter_map(|a| a.to_str())
        .any(|a| a.len() > 1 && a.starts_with('-'))
}

/// First line of a clap error without its `error: ` prefix
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default().trim_end();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

fn wants_help(args: &[OsString]) -> bool {
    args.iter()
        .skip(1)
        .take_while(|a| *a != "--")
        .any(|a| a == "-h" || a == "--help")
}

fn block_on(fut: impl Future<Output = Result<()>>) -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("failed to start async runtime: {e}")))?
        .block_on(fut)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(err: &CliError) {
    eprintln!("{} {err}", style("Error:").red().bold());
    if let Some(help) = err.help() {
        eprintln!("  {} {help}", style("help:").cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_normalize_single_dash_flags() {
        let normalized = normalize_args(args(&[
            "helmit",
            "-chart",
            "./web",
            "-test",
            "-inittestenv=/tmp/kc",
            "-t",
            "-c",
            "x",
        ]));
        assert_eq!(
            normalized,
            args(&[
                "helmit",
                "--chart",
                "./web",
                "--test",
                "--inittestenv=/tmp/kc",
                "-t",
                "-c",
                "x",
            ])
        );
    }

    #[test]
    fn test_normalize_explicit_bool_values() {
        let normalized = normalize_args(args(&[
            "helmit",
            "-test=true",
            "-help=false",
            "--test=1",
            "-t=false",
            "-h=T",
        ]));
        assert_eq!(normalized, args(&["helmit", "--test", "--test", "-h"]));
    }

    #[test]
    fn test_normalize_keeps_unparsable_bool_value() {
        let normalized = normalize_args(args(&["helmit", "-test=maybe"]));
        assert_eq!(normalized, args(&["helmit", "--test=maybe"]));
        assert!(run(normalized).is_err());
    }

    #[test]
    fn test_normalize_leaves_unknown_and_terminated_args() {
        let normalized = normalize_args(args(&["helmit", "-bogus", "--", "-chart"]));
        assert_eq!(normalized, args(&["helmit", "-bogus", "--", "-chart"]));
    }

    #[test]
    fn test_wants_help_anywhere() {
        assert!(wants_help(&args(&["helmit", "--chart", "x", "-h"])));
        assert!(wants_help(&args(&["helmit", "--help", "--test"])));
        assert!(!wants_help(&args(&["helmit", "--chart", "x"])));
        assert!(!wants_help(&args(&["helmit", "--", "-h"])));
        assert!(wants_help(&normalize_args(args(&["helmit", "-help=true"]))));
        assert!(!wants_help(&normalize_args(args(&["helmit", "-help=false"]))));
    }

    #[test]
    fn test_positional_only_args_print_usage() {
        assert!(!has_flags(&args(&["helmit"])));
        assert!(!has_flags(&args(&["helmit", "web", "extra"])));
        assert!(!has_flags(&args(&["helmit", "--", "-c", "web"])));
        assert!(!has_flags(&args(&["helmit", "-"])));
        assert!(has_flags(&args(&["helmit", "web", "-t"])));
        assert!(run(args(&["helmit", "web"])).is_ok());
    }

    #[test]
    fn test_parse_modes() {
        let cli = Cli::try_parse_from(args(&["helmit", "-c", "web", "-t"])).unwrap();
        assert_eq!(cli.chart, Some(PathBuf::from("web")));
        assert!(cli.test);
        assert!(cli.init_test_env.is_none());

        let cli = Cli::try_parse_from(normalize_args(args(&["helmit", "-inittestenv", "kc"])))
            .unwrap();
        assert_eq!(cli.init_test_env, Some(PathBuf::from("kc")));
        assert!(cli.chart.is_none());
        assert_eq!(cli.stage_policy, StagePolicy::FailFast);
    }

    #[test]
    fn test_parse_stage_policy() {
        let cli = Cli::try_parse_from(normalize_args(args(&[
            "helmit",
            "-inittestenv",
            "kc",
            "-stage-policy=last-failure-wins",
        ])))
        .unwrap();
        assert_eq!(cli.stage_policy, StagePolicy::LastFailureWins);

        let err = run(args(&["helmit", "--inittestenv", "kc", "--stage-policy", "retry"]))
            .unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
        assert!(err.to_string().contains("retry"));
    }

    #[test]
    fn test_missing_chart_is_usage_error() {
        let err = run(args(&["helmit", "--test"])).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
        assert_eq!(err.to_string(), "chart path must be specified");
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        let err = run(args(&["helmit", "--bogus"])).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
        let message = err.to_string();
        assert!(message.contains("--bogus"), "{message}");
        assert!(!message.starts_with("error:"), "{message}");
        assert!(!message.contains('\n'), "{message}");
    }
}
