// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Solanagram - a fleet of containerized messaging workers.
//!
//! One binary serves both sides: the control-plane `fleet` and `reaper`
//! commands run on the host, and `worker` runs inside each container.

mod fleet;
mod reaper;
mod shutdown;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use solanagram_config::SolanagramConfig;
use solanagram_core::{ContainerRuntime, SolanagramError};
use solanagram_fleet::DockerRuntime;
use tracing::error;

use crate::fleet::FleetCommand;

/// Solanagram - a fleet of containerized messaging workers.
#[derive(Parser, Debug)]
#[command(name = "solanagram", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the XDG search path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage workers.
    Fleet {
        /// Print results as JSON.
        #[arg(long, global = true)]
        json: bool,
        #[command(subcommand)]
        command: FleetCommand,
    },
    /// Remove orphaned workers periodically until interrupted.
    Reaper,
    /// Run the worker runtime (inside a worker container).
    Worker,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => solanagram_config::load_and_validate_path(path),
        None => solanagram_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            solanagram_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let log_level = match cli.command {
        Commands::Worker => &config.worker.log_level,
        _ => &config.control.log_level,
    };
    init_tracing(log_level);

    let result = match cli.command {
        Commands::Fleet { json, command } => match docker() {
            Ok(runtime) => fleet::run_fleet(&config, runtime, command, json).await,
            Err(e) => Err(e),
        },
        Commands::Reaper => run_reaper(&config).await,
        Commands::Worker => worker::run_worker(&config).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "solanagram failed");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn docker() -> Result<Arc<dyn ContainerRuntime>, SolanagramError> {
    Ok(Arc::new(DockerRuntime::connect()?))
}

async fn run_reaper(config: &SolanagramConfig) -> Result<bool, SolanagramError> {
    let runtime = docker()?;
    let cancel = shutdown::install_signal_handler();
    reaper::run_reaper(config, runtime, cancel).await?;
    Ok(true)
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("solanagram={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
