//! Fleet operator console.
//!
//! Starts a fleet from launch flags (optional) and then reads operator
//! commands from stdin until `stop` is given with no fleet running, stdin
//! closes, or Ctrl-C.

use std::sync::Arc;

// ---

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

// ---

use fleetvisor::{FleetBuilder, LogWriter, Subscribe, TcpLineFactory};

// ---

mod commands;
mod config;

use commands::{Console, Flow};
use config::Config;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---

    let cfg = Config::parse();

    let no_color = std::env::var("NO_COLOR").is_ok()
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(!no_color)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "fleetctl starting");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let fleet = FleetBuilder::new(cfg.fleet_config(), Arc::new(TcpLineFactory::new()))
        .with_subscribers(subs)
        .build();

    match cfg.launch() {
        Some(launch) => {
            info!(server = %launch.endpoint, count = launch.count, "starting fleet from command line");
            if let Err(e) = fleet
                .start_fleet(launch.count, launch.prefix, launch.endpoint)
                .await
            {
                error!(error = e.as_label(), "{e}");
            }
        }
        None => info!("type 'help' for the list of commands"),
    }

    let console = Console::new(fleet.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if console.handle(&line).await? == Flow::Exit {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    fleet.shutdown().await;
    info!("fleetctl closed");
    Ok(())
}
