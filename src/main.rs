use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use knowledge_extractor::config::{Config, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "knowledge-extractor",
    version,
    about = "Load legal documents and serve topic models over them",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the topic modelling API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: u16,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load documents listed in a GUID file
    Load {
        /// File with comma separated document GUIDs
        #[arg(short, long)]
        file: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Serve { config, .. } | Commands::Load { config, .. } => config.clone(),
    };
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing/logging
    setup_tracing(&config.logging, cli.log_format.as_deref(), cli.verbose)?;
    tracing::debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Commands::Serve { port, .. } => {
            tracing::info!(port = %port, config = ?config_path, "Starting serve command");
            commands::serve(port, config).await?;
        }

        Commands::Load { file, .. } => {
            tracing::info!(file = %file.display(), config = ?config_path, "Starting load command");
            commands::load(file, config).await?;
        }
    }

    Ok(())
}

/// RUST_LOG wins over the flags, and the flags win over the config file
fn setup_tracing(logging: &LoggingConfig, format: Option<&str>, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = default_directives(&logging.level, verbose);
            tracing_subscriber::EnvFilter::try_new(directives)
                .with_context(|| format!("Invalid log level '{}'", logging.level))?
        }
    };

    match format.unwrap_or(logging.format.as_str()) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        "text" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        other => anyhow::bail!("Unknown log format '{other}', expected text or json"),
    }

    Ok(())
}

fn default_directives(level: &str, verbose: bool) -> String {
    if verbose {
        "knowledge_extractor=debug,info".to_string()
    } else {
        format!("knowledge_extractor={level},warn")
    }
}
