//! CLI configuration for `fleetctl`.
//!
//! Usage:
//!   fleetctl                                      # interactive, start fleets with `start`
//!   fleetctl --server mc.local:25565 --num 20     # start a fleet right away

use std::time::Duration;

use clap::Parser;
use fleetvisor::{Endpoint, FleetConfig};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "fleetctl", about = "Launch and operate a fleet of client sessions")]
pub struct Config {
    // ---
    /// Server to connect to (`host[:port]`, default port 25565).
    ///
    /// Passing this, `--num` or `--prefix` starts a fleet at launch.
    #[arg(short, long)]
    pub server: Option<Endpoint>,

    /// Number of clients to start at launch (1-100).
    #[arg(short, long)]
    pub num: Option<usize>,

    /// Name prefix of started clients.
    #[arg(short = 'f', long)]
    pub prefix: Option<String>,

    /// First connections allowed in flight at once.
    #[arg(long, default_value_t = 3)]
    pub concurrency: usize,

    /// Failed first-connection attempts before a client is marked failed.
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Per-attempt connect timeout in milliseconds.
    #[arg(long, default_value_t = 20_000)]
    pub connect_timeout_ms: u64,
}

/// Fleet started by the launch flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub count: usize,
    pub prefix: String,
    pub endpoint: Endpoint,
}

impl Config {
    /// Runtime settings with the CLI overrides applied.
    pub fn fleet_config(&self) -> FleetConfig {
        let mut cfg = FleetConfig {
            concurrency_limit: self.concurrency,
            ..FleetConfig::default()
        };
        cfg.retry.max_attempts = self.max_attempts;
        cfg.retry.connect_timeout = Some(Duration::from_millis(self.connect_timeout_ms));
        cfg
    }

    /// The fleet to start at launch, if any launch flag was given.
    pub fn launch(&self) -> Option<Launch> {
        if self.server.is_none() && self.num.is_none() && self.prefix.is_none() {
            return None;
        }
        Some(Launch {
            count: self.num.unwrap_or(5),
            prefix: self.prefix.clone().unwrap_or_else(|| "bot_".to_string()),
            endpoint: self
                .server
                .clone()
                .unwrap_or_else(|| Endpoint::new("localhost", fleetvisor::DEFAULT_PORT)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_means_interactive() {
        let cfg = Config::parse_from(["fleetctl"]);
        assert!(cfg.launch().is_none());
        assert_eq!(cfg.fleet_config(), FleetConfig::default());
    }

    #[test]
    fn any_launch_flag_fills_defaults() {
        let cfg = Config::parse_from(["fleetctl", "--server", "mc.local"]);
        let launch = cfg.launch().unwrap();
        assert_eq!(launch.count, 5);
        assert_eq!(launch.prefix, "bot_");
        assert_eq!(launch.endpoint, Endpoint::new("mc.local", 25565));
    }

    #[test]
    fn overrides_reach_fleet_config() {
        let cfg = Config::parse_from(["fleetctl", "-n", "20", "--concurrency", "5", "--max-attempts", "2"]);
        assert_eq!(cfg.launch().unwrap().count, 20);
        let fleet = cfg.fleet_config();
        assert_eq!(fleet.concurrency_limit, 5);
        assert_eq!(fleet.retry.max_attempts, 2);
    }
}
