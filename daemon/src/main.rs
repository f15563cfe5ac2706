//! Main entry point for the redeployd binary
//!
//! Wires the validator, supervisor, updater, and the selected transport
//! together and runs until a fatal error or Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::warn;

use daemon::transport::http::DEFAULT_PORT;
use daemon::transport::{EmbeddedStreamTransport, WebhookTransport};
use daemon::{
    config, ChildSpec, GitUpdater, PayloadValidator, ProcessSupervisor, StdioMode,
    UpdateCoordinator, Updater,
};
use shared::logging;

/// Supervise a program and redeploy it on authenticated triggers
#[derive(Parser)]
#[command(name = "redeployd")]
#[command(about = "Runs a program, pulls updates on signed redeploy events, and restarts it")]
struct Args {
    /// Start an HTTP server to listen for refresh events instead of
    /// scanning the child's stdout
    #[arg(long)]
    standalone: bool,

    /// Port for the standalone HTTP listener
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Command to execute the supervised program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));
    logging::log_startup("redeployd");

    let config = config::load(config::CONFIG_PATH).context("loading daemon config")?;
    let validator =
        Arc::new(PayloadValidator::from_embedded_key(&config).context("parsing embedded key")?);

    let spec = ChildSpec::from_argv(&args.command).context("parsing command line")?;
    let supervisor = ProcessSupervisor::new(spec);
    let updater = GitUpdater::new();

    // Best effort: start from the freshest checkout, but never refuse to
    // launch because the remote is unreachable.
    if let Err(e) = updater.update().await {
        warn!("Startup update failed, launching the current checkout: {}", e);
    }

    let mut coordinator = UpdateCoordinator::new(updater, supervisor);

    let transport = async {
        if args.standalone {
            coordinator.launch(StdioMode::Attached)?;
            let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
            let coordinator = Arc::new(Mutex::new(coordinator));
            WebhookTransport::new(addr, validator, coordinator).run().await
        } else {
            EmbeddedStreamTransport::new(validator, coordinator)?.run().await
        }
    };

    tokio::select! {
        result = transport => {
            result.context("transport failed")?;
        }
        _ = signal::ctrl_c() => {
            logging::log_shutdown("Received Ctrl+C signal");
        }
    }

    Ok(())
}
