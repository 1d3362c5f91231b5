//! # i2pctl
//!
//! Terminal client to monitor and manage an I2P router through its
//! I2PControl JSON-RPC interface: query status, trigger lifecycle actions,
//! and optionally block until a shutdown has drained the router's
//! participating tunnels.
//!
//! ## Architecture
//!
//! ```text
//! main.rs     — entry point, tracing init, top-level run flow
//! config.rs   — clap CLI flags, I2PCTL_* env overrides, resolved Config
//! client.rs   — I2PControl JSON-RPC client, RouterControl capability trait
//! commands.rs — command table and dispatch
//! monitor.rs  — post-shutdown tunnel drain monitor
//! ```
//!
//! ## Commands
//!
//! | `--method`          | Remote operation                          |
//! |---------------------|-------------------------------------------|
//! | `echo`              | Echo, with the positional args as message |
//! | `restart`           | RouterManager Restart                     |
//! | `graceful-restart`  | RouterManager RestartGraceful             |
//! | `shutdown`          | RouterManager Shutdown                    |
//! | `graceful-shutdown` | RouterManager ShutdownGraceful            |
//! | `update`            | FindUpdates, then Update if one is found  |
//! | `find-update`       | FindUpdates                               |
//! | `stat`              | RouterInfo router status                  |
//! | `netstat`           | RouterInfo network status                 |
//! | `reseedstat`        | RouterInfo reseed state                   |
//! | `tunstat`           | RouterInfo participating tunnel count     |
//! | `ratestat`          | GetRate with `<stat> <period-ms>`         |
//!
//! Every run is single-session and single-command: authenticate, dispatch
//! once, optionally monitor, exit. The first remote error is fatal.

mod client;
mod commands;
mod config;
mod monitor;

use clap::Parser;
use tracing::{debug, error, warn};

use client::ControlClient;
use commands::CommandError;
use config::{Cli, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = Config::from_cli(Cli::parse());
    init_tracing(config.verbose);

    if let Err(e) = run(&config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// One full run: look up the command, establish the session, dispatch, and
/// hand over to the drain monitor when a blocking shutdown was requested.
async fn run(config: &Config) -> Result<(), RunError> {
    // Fail on a bad command name before contacting the endpoint.
    let spec = commands::lookup(&config.method)
        .ok_or_else(|| RunError::Command(CommandError::Unknown(config.method.clone())))?;

    if config.password == config::DEFAULT_PASSWORD {
        warn!("Using the default I2PControl password — set --password or I2PCTL_PASSWORD if your router uses another");
    }

    let mut client = ControlClient::new(config);
    client
        .authenticate(&config.password)
        .await
        .map_err(RunError::Auth)?;
    debug!("Authenticated against {}", config.endpoint_url());

    let outcome = commands::dispatch(&client, spec, &config.args)
        .await
        .map_err(RunError::Command)?;

    if outcome.produces_shutdown && config.block {
        let report = monitor::run_until_drained(&client, monitor::POLL_INTERVAL)
            .await
            .map_err(RunError::Poll)?;
        debug!(
            "Drain finished: {} polls, {} logged changes, {}s elapsed",
            report.polls,
            report.changes.len(),
            report.elapsed.as_secs()
        );
    }

    Ok(())
}

/// Everything that can abort a run. `main` logs it and exits non-zero.
#[derive(Debug)]
enum RunError {
    /// The Authenticate handshake failed; nothing else was attempted.
    Auth(client::ClientError),
    /// The command was unknown, misconfigured, or its remote call failed.
    Command(CommandError),
    /// A tunnel-count poll failed mid-drain.
    Poll(client::ClientError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Auth(e) => write!(f, "Authentication failed: {}", e),
            RunError::Command(e) => write!(f, "{}", e),
            RunError::Poll(e) => write!(f, "Tunnel polling failed: {}", e),
        }
    }
}
