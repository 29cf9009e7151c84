//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::filters::AVAILABLE_FILTERS;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("chart has no metadata to render against")]
    MissingMetadata,
}

/// Coarse classification of a MiniJinja failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    SyntaxError,
    InvalidOperation,
    Other,
}

impl From<minijinja::ErrorKind> for TemplateErrorKind {
    fn from(kind: minijinja::ErrorKind) -> Self {
        match kind {
            minijinja::ErrorKind::UndefinedError => Self::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => Self::UnknownFilter,
            minijinja::ErrorKind::SyntaxError => Self::SyntaxError,
            minijinja::ErrorKind::InvalidOperation => Self::InvalidOperation,
            _ => Self::Other,
        }
    }
}

/// A template failure located in its source
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{template}: {message}")]
#[diagnostic(code(helmit::template::render))]
pub struct TemplateError {
    /// Template name relative to `templates/`
    pub template: String,

    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    pub fn from_minijinja(err: minijinja::Error, template: &str, source: &str) -> Self {
        let kind = TemplateErrorKind::from(err.kind());
        let message = match err.detail() {
            Some(detail) => format!("{}: {detail}", err.kind()),
            None => err.kind().to_string(),
        };

        Self {
            template: template.to_string(),
            message,
            kind,
            src: NamedSource::new(template, source.to_string()),
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion: suggestion_for(kind),
        }
    }
}

/// Byte span of a 1-based line
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let start: usize = source
        .split_inclusive('\n')
        .take(line.checked_sub(1)?)
        .map(str::len)
        .sum();
    let text = source.lines().nth(line - 1)?;
    Some(SourceSpan::new(start.into(), text.len()))
}

fn suggestion_for(kind: TemplateErrorKind) -> Option<String> {
    match kind {
        TemplateErrorKind::UndefinedVariable => Some(
            "Check the spelling, or provide a fallback with `| default(\"...\")`".to_string(),
        ),
        TemplateErrorKind::UnknownFilter => Some(format!(
            "Available filters: {}",
            AVAILABLE_FILTERS.join(", ")
        )),
        TemplateErrorKind::SyntaxError => Some(
            "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements".to_string(),
        ),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
