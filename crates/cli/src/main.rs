use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dxwes_engine::{Pipeline, load_config, load_config_from_path};
use tracing_subscriber::EnvFilter;

mod invoke;
mod response;
mod serve;

/// Run GA4GH WES workflow requests on DNAnexus.
#[derive(Parser, Debug)]
#[command(name = "dxwes", version, about)]
struct Cli {
    /// Configuration file; defaults to DXWES_CONFIG_PATH or the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate one invocation event and print the response body
    Invoke {
        /// Event file, or `-` for stdin
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Serve the WES run endpoint over HTTP
    Serve {
        #[arg(long, default_value = serve::DEFAULT_BIND_ADDRESS)]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
    .context("loading configuration")?;
    let pipeline = Pipeline::from_config(&config)?;

    match cli.command {
        Command::Invoke { event } => invoke::run(&pipeline, &event).await,
        Command::Serve { bind } => {
            serve::run(pipeline, &bind).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// Logs go to stderr; stdout carries only response bodies.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
