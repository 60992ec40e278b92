//! geoloc CLI - Command-line interface
//!
//! Usage:
//!   geoloc extract [--model toolkit|bilstm] <text>
//!   geoloc tokenize <text>
//!   geoloc models

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geoloc_core::AppConfig;
use geoloc_extractor::{LocationExtractor, ModelKind, ModelRegistry, NlpPipeline, Tokenizer};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geoloc")]
#[command(about = "Extract geographic locations from text")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to $GEOLOC_CONFIG, then environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract locations from text
    Extract {
        /// Extractor to use: toolkit (spaCy-style NER) or bilstm
        #[arg(long, short, default_value = "toolkit")]
        model: ModelKind,
        /// Input text
        text: String,
    },
    /// Show how text is tokenized
    Tokenize {
        /// Input text
        text: String,
    },
    /// Show which models load from the configured data directory
    Models,
}

/// Same shape as the HTTP extraction response
#[derive(Serialize)]
struct Extraction<'a> {
    input_text: &'a str,
    extracted_locations: Vec<String>,
    model_used: &'a str,
    error_message: Option<String>,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("geoloc_extractor={level},geoloc_core={level}").into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    init_tracing(&config.logging.level);

    match cli.command {
        Commands::Extract { model, text } => {
            let registry = ModelRegistry::load(&config.models);
            let extractor = registry.extractor(model)?;
            let locations = extractor.extract_locations(&text)?;
            let output = Extraction {
                input_text: &text,
                extracted_locations: locations,
                model_used: extractor.model_name(),
                error_message: None,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Tokenize { text } => {
            let registry = ModelRegistry::load(&config.models);
            let tokens = match registry.pipeline() {
                Some(pipeline) => pipeline.tokenize(&text)?,
                None => {
                    tracing::warn!("toolkit not loaded; using the default tokenizer rules");
                    Tokenizer::new().tokenize(&text)
                }
            };
            for token in tokens {
                println!("{}\t{}..{}\t{}", token.index, token.start, token.end, token.text);
            }
        }
        Commands::Models => {
            let registry = ModelRegistry::load(&config.models);
            println!("{}", serde_json::to_string_pretty(&registry.status())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_model_flag() {
        let cli = Cli::try_parse_from(["geoloc", "extract", "--model", "bilstm", "Paris"]).unwrap();
        match cli.command {
            Commands::Extract { model, text } => {
                assert_eq!(model, ModelKind::Bilstm);
                assert_eq!(text, "Paris");
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_extract_defaults_to_toolkit() {
        let cli = Cli::try_parse_from(["geoloc", "--config", "geoloc.toml", "extract", "Lima"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("geoloc.toml")));
        assert!(matches!(
            cli.command,
            Commands::Extract {
                model: ModelKind::Toolkit,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(Cli::try_parse_from(["geoloc", "extract", "--model", "gpt", "Lima"]).is_err());
    }
}
