//! Operator console commands.
//!
//! One command per stdin line. While the fleet is settling (maintenance mode)
//! only `stop` is accepted; `stop` with no running service exits the program.

use fleetvisor::{ClientState, ControlError, Endpoint, EndpointError, FleetController};
use thiserror::Error;
use tracing::{error, info, warn};

pub const HELP: &[(&str, &str)] = &[
    ("start <count> <prefix> <host:port>", "start a fleet"),
    ("stop", "stop the fleet, or exit when none is running"),
    ("bots", "list clients and their state"),
    ("kick <name>", "quit one client (no reconnect)"),
    ("restore <name>", "recreate one client"),
    ("say <message>", "every online client sends the message"),
    ("say <name> <message...>", "one client sends the message"),
    ("status", "show fleet status"),
    ("help", "show this help"),
];

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        count: usize,
        prefix: String,
        endpoint: Endpoint,
    },
    Stop,
    Bots,
    Kick(String),
    Restore(String),
    /// `target = None` broadcasts.
    Say {
        target: Option<String>,
        text: String,
    },
    Status,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid client count {0:?} (1-100)")]
    InvalidCount(String),
    #[error("invalid server address: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("unknown command {0:?}, type 'help' for the list")]
    Unknown(String),
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = args.first() else {
        return Ok(None);
    };

    let cmd = match first.to_lowercase().as_str() {
        "start" => {
            let [_, count, prefix, server, ..] = args[..] else {
                return Err(ParseError::Usage("start <count> <prefix> <host:port>"));
            };
            let count = count
                .parse()
                .map_err(|_| ParseError::InvalidCount(count.to_string()))?;
            Command::Start {
                count,
                prefix: prefix.to_string(),
                endpoint: server.parse()?,
            }
        }
        "stop" => Command::Stop,
        "bots" => Command::Bots,
        "kick" => match args.get(1) {
            Some(name) => Command::Kick(name.to_string()),
            None => return Err(ParseError::Usage("kick <name>")),
        },
        "restore" => match args.get(1) {
            Some(name) => Command::Restore(name.to_string()),
            None => return Err(ParseError::Usage("restore <name>")),
        },
        "say" => match &args[1..] {
            [] => return Err(ParseError::Usage("say [name] <message>")),
            [text] => Command::Say {
                target: None,
                text: text.to_string(),
            },
            [target, rest @ ..] => Command::Say {
                target: Some(target.to_string()),
                text: rest.join(" "),
            },
        },
        "status" => Command::Status,
        "help" => Command::Help,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

/// What the console loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Runs console lines against a fleet.
pub struct Console {
    fleet: FleetController,
}

impl Console {
    pub fn new(fleet: FleetController) -> Self {
        Self { fleet }
    }

    pub async fn handle(&self, line: &str) -> anyhow::Result<Flow> {
        let parsed = parse(line);
        let snap = self.fleet.snapshot().await?;

        if let Ok(Some(Command::Stop)) = parsed {
            if !snap.service_running {
                info!("exiting");
                return Ok(Flow::Exit);
            }
            self.fleet.stop_fleet().await;
            info!("fleet stopped");
            return Ok(Flow::Continue);
        }
        if snap.maintenance_mode {
            if !line.trim().is_empty() {
                warn!("maintenance mode: waiting for every client to finish its first connection (only 'stop' is accepted)");
            }
            return Ok(Flow::Continue);
        }

        let cmd = match parsed {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                error!("{e}");
                return Ok(Flow::Continue);
            }
        };
        if let Err(e) = self.run(cmd).await {
            match e {
                ControlError::Closed => return Err(e.into()),
                e => error!(error = e.as_label(), "{e}"),
            }
        }
        Ok(Flow::Continue)
    }

    async fn run(&self, cmd: Command) -> Result<(), ControlError> {
        match cmd {
            Command::Start {
                count,
                prefix,
                endpoint,
            } => {
                self.fleet.start_fleet(count, prefix, endpoint.clone()).await?;
                info!(count, %endpoint, "fleet starting; commands are disabled until every client connected or failed");
            }
            Command::Stop => self.fleet.stop_fleet().await,
            Command::Bots => {
                let snap = self.fleet.snapshot().await?;
                info!(total = snap.clients.len(), "clients");
                for c in &snap.clients {
                    let pending = if c.first_pending { " (first connection pending)" } else { "" };
                    let role = if c.listener { " [listener]" } else { "" };
                    match c.state {
                        ClientState::Online => info!("- {}: {}{role}{pending}", c.identity, c.state),
                        _ => warn!("- {}: {}{role}{pending}", c.identity, c.state),
                    }
                }
            }
            Command::Kick(name) => {
                self.fleet.kick(name.as_str()).await?;
                info!(identity = %name, "kicked");
            }
            Command::Restore(name) => {
                self.fleet.restore(name.as_str()).await?;
                info!(identity = %name, "restoring");
            }
            Command::Say { target: None, text } => {
                let delivered = self.fleet.broadcast(text.as_str()).await?;
                info!(clients = delivered.len(), %text, "broadcast");
            }
            Command::Say {
                target: Some(name),
                text,
            } => {
                self.fleet.send(name.as_str(), text.as_str()).await?;
                info!(identity = %name, %text, "sent");
            }
            Command::Status => {
                let s = self.fleet.snapshot().await?;
                info!(
                    maintenance = s.maintenance_mode,
                    service_running = s.service_running,
                    all_ready = s.all_ready,
                    active_connections = s.active_connections,
                    queued = s.queued,
                    settled = s.settled,
                    online = s.online(),
                    total = s.clients.len(),
                    "status"
                );
            }
            Command::Help => {
                for (usage, what) in HELP {
                    info!("  {usage:<36} {what}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start() {
        assert_eq!(
            parse("start 10 bot_ mc.local:25566").unwrap(),
            Some(Command::Start {
                count: 10,
                prefix: "bot_".into(),
                endpoint: Endpoint::new("mc.local", 25566),
            })
        );
        assert_eq!(parse("start 10 bot_"), Err(ParseError::Usage("start <count> <prefix> <host:port>")));
        assert!(matches!(parse("start ten bot_ host"), Err(ParseError::InvalidCount(_))));
        assert!(matches!(parse("start 3 bot_ host:abc"), Err(ParseError::Endpoint(_))));
    }

    #[test]
    fn say_with_one_word_broadcasts() {
        assert_eq!(
            parse("say hello").unwrap(),
            Some(Command::Say { target: None, text: "hello".into() })
        );
        assert_eq!(
            parse("say bot_002 hello there").unwrap(),
            Some(Command::Say {
                target: Some("bot_002".into()),
                text: "hello there".into()
            })
        );
        assert!(parse("say").is_err());
    }

    #[test]
    fn commands_are_case_insensitive_and_blank_is_ignored() {
        assert_eq!(parse("  STOP ").unwrap(), Some(Command::Stop));
        assert_eq!(parse("Kick bot_001").unwrap(), Some(Command::Kick("bot_001".into())));
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("dance"), Err(ParseError::Unknown("dance".into())));
    }
}
