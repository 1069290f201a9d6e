//! RenderKit CLI - Debug front end for the renderer
//!
//! Commands: render, check
//! Rendered text goes to stdout, diagnostics to stderr.
//! Returns 2 on template failure in strict mode.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderkit_core::{DataModel, RendererConfig, TemplateRenderer, ENGINE_VERSION};

#[derive(Parser)]
#[command(name = "renderkit-cli")]
#[command(about = "RenderKit CLI - render templates against JSON data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory searched for bare template names
    #[arg(short, long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Renderer configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template and print the result
    Render {
        /// Template file or name inside the templates directory
        #[arg(short, long)]
        template: PathBuf,

        /// Data model file (JSON object)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Report failures instead of printing the unrendered template
        #[arg(long)]
        strict: bool,

        /// Print cache statistics to stderr afterwards
        #[arg(long)]
        stats: bool,
    },

    /// Compile a template without rendering it
    Check {
        /// Template file or name inside the templates directory
        #[arg(short, long)]
        template: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "renderkit_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match RendererConfig::load_from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", json_error(&e.to_string()));
                return ExitCode::FAILURE;
            }
        },
        None => RendererConfig::default(),
    };

    let renderer = match TemplateRenderer::from_config(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", json_error(&e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Render { template, data, strict, stats } => {
            let content = match read_template(&cli.templates_dir, &template) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", json_error(&e));
                    return ExitCode::FAILURE;
                }
            };
            let model = match data.as_deref().map(read_model).transpose() {
                Ok(m) => m.unwrap_or_default(),
                Err(e) => {
                    eprintln!("{}", json_error(&e));
                    return ExitCode::FAILURE;
                }
            };

            let code = if strict {
                match renderer.try_render(&content, &model) {
                    Ok(output) => {
                        print!("{}", output);
                        ExitCode::SUCCESS
                    }
                    Err(failure) => {
                        let output = serde_json::json!({
                            "success": false,
                            "kind": failure.kind(),
                            "fingerprint": failure.fingerprint,
                            "error": failure.error.to_string(),
                        });
                        println!("{}", output);
                        ExitCode::from(2)
                    }
                }
            } else {
                print!("{}", renderer.render(&content, &model));
                ExitCode::SUCCESS
            };

            if stats {
                let output = serde_json::json!({
                    "engine_version": ENGINE_VERSION,
                    "stats": renderer.cache().stats(),
                    "entries": renderer.cache().entries(),
                });
                eprintln!("{}", output);
            }
            code
        }

        Commands::Check { template } => {
            let content = match read_template(&cli.templates_dir, &template) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", json_error(&e));
                    return ExitCode::FAILURE;
                }
            };

            match renderer.precompile(&content) {
                Ok(fingerprint) => {
                    let output = serde_json::json!({
                        "valid": true,
                        "fingerprint": fingerprint,
                    });
                    println!("{}", output);
                    ExitCode::SUCCESS
                }
                Err(failure) => {
                    let output = serde_json::json!({
                        "valid": false,
                        "kind": failure.kind(),
                        "error": failure.error.to_string(),
                    });
                    println!("{}", output);
                    ExitCode::from(2)
                }
            }
        }
    }
}

/// Paths that exist are used as given; anything else is looked up in the
/// templates directory.
fn read_template(templates_dir: &Path, template: &Path) -> Result<String, String> {
    let path = if template.exists() {
        template.to_path_buf()
    } else {
        templates_dir.join(template)
    };
    fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read template {}: {}", path.display(), e))
}

fn read_model(path: &Path) -> Result<DataModel, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read data {}: {}", path.display(), e))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid data {}: {}", path.display(), e))?;
    DataModel::from_json(value)
        .ok_or_else(|| format!("Data model {} must be a JSON object", path.display()))
}

fn json_error(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}
