//! Template Renderer - Single Entry Point
//!
//! `try_render` reports failures as values. `render` is the best-effort
//! adapter on top of it: failures are logged at error level and the caller
//! gets the original template text back, unrendered.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::cache::{CacheConfig, RenderCache};
use crate::config::RendererConfig;
use crate::engine::{EngineError, MiniJinjaEngine, TemplateEngine};
use crate::hashing::{Fingerprint, Fingerprinter, Sha256Fingerprinter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Compilation,
    Execution,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Compilation => "compilation",
            ErrorKind::Execution => "execution",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Template compilation failed: {message}")]
    Compilation { message: String },

    #[error("Template execution failed: {message}")]
    Execution { message: String },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Compilation { .. } => ErrorKind::Compilation,
            RenderError::Execution { .. } => ErrorKind::Execution,
        }
    }
}

impl From<EngineError> for RenderError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Execution(message) => RenderError::Execution { message },
            EngineError::Compilation(message) | EngineError::Configuration(message) => {
                RenderError::Compilation { message }
            }
        }
    }
}

/// A failed render, still holding the text the caller submitted.
#[derive(Debug, Clone, Error)]
#[error("Failed to render template {}: {error}", .fingerprint.short())]
pub struct RenderFailure {
    pub fingerprint: Fingerprint,
    #[source]
    pub error: RenderError,
    pub original: String,
}

impl RenderFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn into_original(self) -> String {
        self.original
    }
}

/// Renders template text against data models, reusing compiled templates.
///
/// Share it between threads behind an `Arc`; every method takes `&self`.
pub struct TemplateRenderer<E: TemplateEngine = MiniJinjaEngine> {
    engine: E,
    cache: RenderCache<E::Compiled>,
    fingerprinter: Box<dyn Fingerprinter>,
}

impl TemplateRenderer<MiniJinjaEngine> {
    pub fn from_config(config: &RendererConfig) -> Result<Self, EngineError> {
        let engine = MiniJinjaEngine::new(config.syntax, config.undefined)?;
        Ok(Self::with_engine(engine, config.cache_config()))
    }
}

impl<E: TemplateEngine> TemplateRenderer<E> {
    pub fn with_engine(engine: E, cache: CacheConfig) -> Self {
        Self {
            engine,
            cache: RenderCache::new(cache),
            fingerprinter: Box::new(Sha256Fingerprinter),
        }
    }

    /// Replace the SHA-256 fingerprinter.
    pub fn with_fingerprinter(mut self, fingerprinter: impl Fingerprinter + 'static) -> Self {
        self.fingerprinter = Box::new(fingerprinter);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &RenderCache<E::Compiled> {
        &self.cache
    }

    pub fn fingerprint(&self, content: &str) -> Fingerprint {
        self.fingerprinter.fingerprint(content)
    }

    /// Render `content` against `data`, reporting any failure.
    pub fn try_render<S>(&self, content: &str, data: &S) -> Result<String, RenderFailure>
    where
        S: Serialize + ?Sized,
    {
        let key = self.fingerprint(content);
        let outcome = self
            .cache
            .get_or_compile(&key, content, || self.engine.compile(key.as_str(), content))
            .and_then(|compiled| {
                let mut out = String::with_capacity(content.len());
                self.engine.execute(&compiled, data, &mut out)?;
                Ok(out)
            });

        outcome.map_err(|err| RenderFailure {
            fingerprint: key,
            error: err.into(),
            original: content.to_string(),
        })
    }

    /// Render `content` against `data`. Never fails: on error the failure is
    /// logged and `content` is returned unchanged.
    pub fn render<S>(&self, content: &str, data: &S) -> String
    where
        S: Serialize + ?Sized,
    {
        match self.try_render(content, data) {
            Ok(rendered) => rendered,
            Err(failure) => {
                tracing::error!(
                    fingerprint = %failure.fingerprint,
                    kind = %failure.kind(),
                    error = %failure.error,
                    "Template render failed, returning original content"
                );
                failure.into_original()
            }
        }
    }

    /// Compile and cache `content` without rendering it.
    pub fn precompile(&self, content: &str) -> Result<Fingerprint, RenderFailure> {
        let key = self.fingerprint(content);
        match self
            .cache
            .get_or_compile(&key, content, || self.engine.compile(key.as_str(), content))
        {
            Ok(_) => Ok(key),
            Err(err) => Err(RenderFailure {
                fingerprint: key,
                error: err.into(),
                original: content.to_string(),
            }),
        }
    }
}
