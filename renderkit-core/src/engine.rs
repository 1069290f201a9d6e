//! Template Engine - Compile/Execute Contract
//!
//! The renderer never parses template text itself. It hands text to a
//! `TemplateEngine`, caches whatever the engine compiles, and executes that
//! compiled form against each data model.

use minijinja::syntax::SyntaxConfig;
use minijinja::value::Value;
use minijinja::{
    escape_formatter, AutoEscape, Environment, Error as TemplateError, Output, State, UndefinedBehavior,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

/// Delimiter set used by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxStyle {
    /// `${ var }` placeholders, `{% %}` blocks, `<#-- -->` comments
    #[default]
    Dollar,
    /// Stock `{{ var }}` placeholders
    Jinja,
}

/// How references to names missing from the data model are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Missing values and any attribute of them render empty
    #[default]
    Chainable,
    /// Missing values render empty, attribute access on them fails
    Lenient,
    /// Any use of a missing value fails
    Strict,
}

impl From<UndefinedPolicy> for UndefinedBehavior {
    fn from(policy: UndefinedPolicy) -> Self {
        match policy {
            UndefinedPolicy::Chainable => UndefinedBehavior::Chainable,
            UndefinedPolicy::Lenient => UndefinedBehavior::Lenient,
            UndefinedPolicy::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Outbound templating capability.
pub trait TemplateEngine: Send + Sync {
    /// Engine-owned compiled form, immutable once built.
    type Compiled: Send + Sync;

    /// Parse `source`. `name` identifies the template in engine diagnostics.
    fn compile(&self, name: &str, source: &str) -> Result<Self::Compiled, EngineError>;

    /// Run a compiled template against `data`, appending output to `out`.
    fn execute<S>(&self, compiled: &Self::Compiled, data: &S, out: &mut String) -> Result<(), EngineError>
    where
        S: Serialize + ?Sized;
}

/// A single template compiled into its own copy of the configured environment.
pub struct MiniJinjaTemplate {
    env: Environment<'static>,
    name: String,
}

impl fmt::Debug for MiniJinjaTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// MiniJinja-backed engine.
#[derive(Clone)]
pub struct MiniJinjaEngine {
    base: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new(syntax: SyntaxStyle, undefined: UndefinedPolicy) -> Result<Self, EngineError> {
        let mut env = base_environment(undefined);
        if let Some(config) = syntax_config(syntax)? {
            env.set_syntax(config);
        }
        Ok(Self { base: env })
    }
}

fn base_environment(undefined: UndefinedPolicy) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(undefined.into());
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.set_formatter(null_as_empty);
    env
}

/// Nulls in the data model print as nothing, like missing values do.
fn null_as_empty(out: &mut Output, state: &State, value: &Value) -> Result<(), TemplateError> {
    if value.is_none() {
        return Ok(());
    }
    escape_formatter(out, state, value)
}

fn syntax_config(syntax: SyntaxStyle) -> Result<Option<SyntaxConfig>, EngineError> {
    match syntax {
        SyntaxStyle::Jinja => Ok(None),
        SyntaxStyle::Dollar => SyntaxConfig::builder()
            .block_delimiters("{%", "%}")
            .variable_delimiters("${", "}")
            .comment_delimiters("<#--", "-->")
            .build()
            .map(Some)
            .map_err(|err| EngineError::Configuration(err.to_string())),
    }
}

impl TemplateEngine for MiniJinjaEngine {
    type Compiled = MiniJinjaTemplate;

    fn compile(&self, name: &str, source: &str) -> Result<Self::Compiled, EngineError> {
        let mut env = self.base.clone();
        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(|err| EngineError::Compilation(err.to_string()))?;
        Ok(MiniJinjaTemplate { env, name: name.to_string() })
    }

    fn execute<S>(&self, compiled: &Self::Compiled, data: &S, out: &mut String) -> Result<(), EngineError>
    where
        S: Serialize + ?Sized,
    {
        let template = compiled
            .env
            .get_template(&compiled.name)
            .map_err(|err| EngineError::Execution(err.to_string()))?;
        let rendered = template
            .render(data)
            .map_err(|err| EngineError::Execution(err.to_string()))?;
        out.push_str(&rendered);
        Ok(())
    }
}

impl Default for MiniJinjaEngine {
    /// Default syntax style and undefined policy, same as `RendererConfig::default()`.
    fn default() -> Self {
        Self::new(SyntaxStyle::default(), UndefinedPolicy::default())
            .expect("built-in delimiters form a valid syntax config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(engine: &MiniJinjaEngine, source: &str, data: serde_json::Value) -> Result<String, EngineError> {
        let compiled = engine.compile("t", source)?;
        let mut out = String::new();
        engine.execute(&compiled, &data, &mut out)?;
        Ok(out)
    }

    fn dollar() -> MiniJinjaEngine {
        MiniJinjaEngine::new(SyntaxStyle::Dollar, UndefinedPolicy::Chainable).unwrap()
    }

    #[test]
    fn test_dollar_placeholders() {
        let out = render(&dollar(), "Hello, ${name}!", json!({"name": "World"})).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn test_jinja_placeholders() {
        let engine = MiniJinjaEngine::new(SyntaxStyle::Jinja, UndefinedPolicy::Chainable).unwrap();
        let out = render(&engine, "Hello, {{ name }}!", json!({"name": "World"})).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn test_chainable_missing_attribute() {
        let out = render(&dollar(), "[${a.b.c}]", json!({})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_strict_missing_fails_at_execution() {
        let engine = MiniJinjaEngine::new(SyntaxStyle::Dollar, UndefinedPolicy::Strict).unwrap();
        let err = render(&engine, "${missing}", json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }

    #[test]
    fn test_syntax_error_is_compilation() {
        let err = dollar().compile("t", "Hello ${name").unwrap_err();
        assert!(matches!(err, EngineError::Compilation(_)));
    }

    #[test]
    fn test_blocks_over_collections() {
        let out = render(
            &dollar(),
            "{% for code in codes %}${code};{% endfor %}",
            json!({"codes": ["EU", "CA"]}),
        )
        .unwrap();
        assert_eq!(out, "EU;CA;");
    }

    #[test]
    fn test_no_html_escaping() {
        let out = render(&dollar(), "${v}", json!({"v": "<a & b>"})).unwrap();
        assert_eq!(out, "<a & b>");
    }

    #[test]
    fn test_trailing_newline_kept() {
        let out = render(&dollar(), "line\n", json!({})).unwrap();
        assert_eq!(out, "line\n");
    }

    #[test]
    fn test_default_engine_uses_dollar_syntax() {
        let out = render(&MiniJinjaEngine::default(), "${x.y}ok ${n}", json!({"n": 1})).unwrap();
        assert_eq!(out, "ok 1");
    }

    #[test]
    fn test_null_renders_empty() {
        let out = render(&dollar(), "[${x}] [${y}]", json!({"x": null, "y": 0})).unwrap();
        assert_eq!(out, "[] [0]");
    }

    #[test]
    fn test_null_renders_empty_with_jinja_syntax() {
        let engine = MiniJinjaEngine::new(SyntaxStyle::Jinja, UndefinedPolicy::Chainable).unwrap();
        let out = render(&engine, "[{{ x }}]", json!({"x": null})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_dollar_comments_are_dropped() {
        let out = render(&dollar(), "a<#-- note ${x} -->b", json!({"x": 1})).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_compiled_template_debug() {
        let compiled = dollar().compile("greeting", "hi").unwrap();
        assert!(format!("{:?}", compiled).contains("greeting"));
    }
}
