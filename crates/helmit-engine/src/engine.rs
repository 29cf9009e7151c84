//! Template engine based on MiniJinja

use std::collections::BTreeMap;

use helmit_core::{Chart, TemplateContext};
use minijinja::{Environment, UndefinedBehavior};

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;

/// File name (under `templates/`) rendered as release notes
const NOTES_FILE: &str = "NOTES.txt";

/// Result of rendering a chart
#[derive(Debug, Default)]
pub struct RenderResult {
    /// Rendered manifests by template name, in sorted order
    pub manifests: BTreeMap<String, String>,

    /// Rendered `NOTES.txt`, if the chart has one
    pub notes: Option<String>,
}

impl RenderResult {
    /// All manifests as one multi-document YAML stream
    pub fn combined(&self) -> String {
        self.manifests
            .iter()
            .map(|(name, body)| format!("---\n# Source: {name}\n{}\n", body.trim_end()))
            .collect()
    }
}

/// Template engine builder
#[derive(Debug)]
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(if self.strict_mode {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("required", filters::required);

        env
    }

    fn context_value(context: &TemplateContext) -> minijinja::Value {
        minijinja::context! {
            values => &context.values,
            release => &context.release,
            chart => &context.chart,
            capabilities => &context.capabilities,
        }
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.environment();
        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        let tmpl = env
            .get_template(template_name)
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        tmpl.render(Self::context_value(context))
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template).into())
    }

    /// Render every template of a chart
    ///
    /// Helpers (file name starting with `_`) are loaded so they can be
    /// included, but produce no output. Templates rendering to nothing but
    /// whitespace or a bare `---` are dropped.
    pub fn render_chart(&self, chart: &Chart, context: &TemplateContext) -> Result<RenderResult> {
        if chart.metadata.is_none() {
            return Err(EngineError::MissingMetadata);
        }

        let mut env = self.environment();
        let sources: BTreeMap<&str, String> = chart
            .templates
            .iter()
            .map(|t| (t.name.as_str(), t.contents().into_owned()))
            .collect();

        for (&name, source) in &sources {
            env.add_template_owned(name.to_string(), source.clone())
                .map_err(|e| TemplateError::from_minijinja(e, name, source))?;
        }

        let ctx = Self::context_value(context);
        let mut result = RenderResult::default();

        for (&name, source) in &sources {
            let file_name = name.rsplit('/').next().unwrap_or(name);
            if file_name.starts_with('_') {
                continue;
            }

            let rendered = env
                .get_template(name)
                .and_then(|tmpl| tmpl.render(&ctx))
                .map_err(|e| TemplateError::from_minijinja(e, name, source))?;

            if file_name.eq_ignore_ascii_case(NOTES_FILE) {
                result.notes = Some(rendered);
                continue;
            }

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                tracing::debug!(template = %name, "template rendered empty, skipping");
                continue;
            }
            result.manifests.insert(name.to_string(), rendered);
        }

        tracing::debug!(
            chart = chart.name(),
            manifests = result.manifests.len(),
            "chart rendered"
        );
        Ok(result)
    }
}
