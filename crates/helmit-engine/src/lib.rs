//! Helmit Engine - renders chart templates into Kubernetes manifests
//!
//! Templates use MiniJinja (Jinja2) syntax with a small set of chart filters
//! (`toyaml`, `b64encode`, `nindent`, ...).

pub mod engine;
pub mod error;
pub mod filters;

pub use engine::{Engine, EngineBuilder, RenderResult};
pub use error::{EngineError, TemplateError, TemplateErrorKind};
pub use filters::AVAILABLE_FILTERS;
