//! RenderKit Core - Cached Template Rendering
//!
//! Renders template text against a data model, memoizing compiled
//! templates by content fingerprint.
//!
//! # Guarantees
//! 1. Output depends only on the template text and the data model
//! 2. Identical template text is compiled once per cache lifetime
//! 3. Missing variables render empty
//! 4. `render` always returns a string; on failure it is the input, unchanged
//!
//! ```no_run
//! use renderkit_core::{DataModel, RendererConfig, TemplateRenderer};
//!
//! let renderer = TemplateRenderer::from_config(&RendererConfig::default()).unwrap();
//! let model = DataModel::new().with("name", "World");
//! assert_eq!(renderer.render("Hello, ${name}!", &model), "Hello, World!");
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod hashing;
pub mod model;
pub mod renderer;

pub use cache::{CacheConfig, CacheEntryInfo, CacheStats, RenderCache};
pub use config::{CacheSettings, ConfigError, RendererConfig};
pub use engine::{EngineError, MiniJinjaEngine, SyntaxStyle, TemplateEngine, UndefinedPolicy};
pub use hashing::{sha256_hex, Fingerprint, Fingerprinter, Sha256Fingerprinter};
pub use model::DataModel;
pub use renderer::{ErrorKind, RenderError, RenderFailure, TemplateRenderer};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
