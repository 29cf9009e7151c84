//! Helmit Core - chart model, decoder and structural lint
//!
//! This crate provides the foundational types used throughout helmit:
//! - `Chart`: a decoded chart with metadata, templates, values and files
//! - `Values`: configuration values with deep merge support
//! - `TemplateContext`: what templates see when rendered
//! - `load_chart`: load, validate and lint a chart from disk

pub mod archive;
pub mod chart;
pub mod context;
pub mod error;
pub mod lint;
pub mod loader;
pub mod values;

pub use chart::{Chart, ChartFile, ChartMetadata, Dependency, Maintainer};
pub use context::{Capabilities, ChartInfo, ReleaseInfo, TemplateContext};
pub use error::CoreError;
pub use lint::{LintError, lint_chart};
pub use loader::{load, load_archive, load_chart, load_descriptor, load_dir, load_files};
pub use values::Values;
