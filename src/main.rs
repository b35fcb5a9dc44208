//! The Quorum-Boot cluster bootstrap controller.

mod app;
mod bootstrap;
mod cluster;
mod config;
mod dns;
mod error;
#[cfg(test)]
mod fixtures;
mod health;
#[cfg(test)]
mod health_test;
mod roster;

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use tracing_subscriber::prelude::*;

use crate::config::Config;
use crate::health::HealthMonitor;

/// The CLI surface of the bootstrap controller.
#[derive(Debug, StructOpt)]
#[structopt(name = "quorum-boot", about = "Bootstrap controller for elastic quorum key-value clusters.")]
struct Cli {
    /// The mode to run in.
    #[structopt(default_value = "bootstrap", possible_values = &["bootstrap", "healthcheck", "shell"])]
    mode: Mode,
}

/// The run modes supported by this binary.
#[derive(Clone, Copy, Debug)]
enum Mode {
    /// Reconcile cluster membership and hand off to the storage engine.
    Bootstrap,
    /// Run the long-lived health monitor loop.
    Healthcheck,
    /// Exec the configured shell, an operator escape hatch.
    Shell,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(val: &str) -> Result<Self> {
        match val {
            "bootstrap" => Ok(Mode::Bootstrap),
            "healthcheck" => Ok(Mode::Healthcheck),
            "shell" => Ok(Mode::Shell),
            _ => bail!("unknown mode '{}', expected bootstrap | healthcheck | shell", val),
        }
    }
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = ?err);
            error::exit_code(&err)
        }
    };

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    std::process::exit(code);
}

async fn run() -> Result<()> {
    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the RUST_LOG env var.
        .with(tracing_subscriber::EnvFilter::from_default_env())
        // Send a copy of all spans to stdout in compact form.
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true),
        )
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;

    let cli = Cli::from_args();
    let cfg = Arc::new(Config::new()?);
    tracing::info!(
        mode = ?cli.mode,
        scheme = %cfg.scheme,
        client_port = %cfg.client_port,
        server_port = %cfg.server_port,
        marker_path = %cfg.marker_path,
        "starting Quorum-Boot controller",
    );

    match cli.mode {
        Mode::Bootstrap => app::run_bootstrap(cfg).await,
        Mode::Healthcheck => HealthMonitor::new(cfg)?.run().await,
        Mode::Shell => app::run_shell(&cfg),
    }
}
