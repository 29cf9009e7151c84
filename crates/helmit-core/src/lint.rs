//! Local structural lint applied after a chart is decoded

use thiserror::Error;

use crate::chart::Chart;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintError {
    #[error("chart has no metadata")]
    NoMetadata,

    #[error("chart has no name")]
    NoName,

    #[error("chart has no version")]
    NoVersion,

    #[error("chart has no templates")]
    NoTemplates,
}

type Rule = fn(&Chart) -> bool;

fn no_metadata(chart: &Chart) -> bool {
    chart.metadata.is_none()
}

fn no_name(chart: &Chart) -> bool {
    chart.metadata.as_ref().is_some_and(|m| m.name.is_empty())
}

fn no_version(chart: &Chart) -> bool {
    chart.metadata.as_ref().is_some_and(|m| m.version.is_empty())
}

fn no_templates(chart: &Chart) -> bool {
    chart.templates.is_empty()
}

/// Rules in evaluation order; each returns true when the chart violates it
const RULES: &[(LintError, Rule)] = &[
    (LintError::NoMetadata, no_metadata),
    (LintError::NoName, no_name),
    (LintError::NoVersion, no_version),
    (LintError::NoTemplates, no_templates),
];

/// Check a chart against the lint rules, reporting the first violation
pub fn lint_chart(chart: &Chart) -> Result<(), LintError> {
    match RULES.iter().find(|(_, violated)| violated(chart)) {
        Some((err, _)) => {
            tracing::debug!(chart = chart.name(), error = %err, "lint failed");
            Err(*err)
        }
        None => Ok(()),
    }
}
