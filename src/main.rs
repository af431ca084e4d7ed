//! nanobanana-relay - OpenAI-compatible relay for the NanoBanana upstream
//!
//! Serves `/v1/chat/completions` and `/v1/models`, forwarding chat requests
//! to a single upstream and pseudo-streaming the answers back.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nanobanana_relay::config::Config;
use nanobanana_relay::proxy::run_server;

#[derive(Parser)]
#[command(name = "nanobanana-relay")]
#[command(about = "OpenAI-compatible chat completion relay for the NanoBanana upstream")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server (default)
    Serve {
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the listen port (takes precedence over PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration
    Check {
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the advertised model identifiers
    Models {
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(level: &str) {
    let default_filter = format!("nanobanana_relay={},tower_http=info", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        config: None,
        port: None,
    });

    match command {
        Commands::Serve { config, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(port) = port {
                config.server.listen.set_port(port);
            }
            init_tracing(&config.logging.level);
            for warning in config.warnings() {
                tracing::warn!("{}", warning);
            }

            tracing::info!(listen = %config.server.listen, "Starting nanobanana-relay");
            run_server(config).await
        }

        Commands::Check { config } => {
            let config = Config::load(config.as_deref())?;
            println!("Configuration OK");
            for warning in config.warnings() {
                println!("  warning:  {}", warning);
            }
            println!("  listen:   {}", config.server.listen);
            println!("  upstream: {}", config.upstream.url);
            println!("  model:    {}", config.upstream.model);
            println!("  models:   {}", config.models.len());
            println!(
                "  auth:     {}",
                if config.auth.is_open() {
                    "open (API_MASTER_KEY=1)"
                } else {
                    "bearer token required"
                }
            );
            Ok(())
        }

        Commands::Models { config } => {
            let config = Config::load(config.as_deref())?;
            for model in &config.models {
                println!("{}", model);
            }
            Ok(())
        }
    }
}
