//! # Logging subscriber.
//!
//! [`LogWriter`] renders fleet events as `tracing` records, one per event, so
//! the host application decides format and destination through its
//! `tracing-subscriber` setup.
//!
//! ## Output (fmt layer, no target)
//! ```text
//!  INFO fleet starting total=5 endpoint=localhost:25565
//!  INFO client admitted identity=bot_001 active=1
//!  INFO state identity=bot_001 from=connecting to=online reason=ready
//!  WARN backoff identity=bot_002 attempt=1 delay_ms=2000 reason="fault: refused"
//!  INFO fleet settled outcome=partial online=4 total=5
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every fleet event through `tracing`.
///
/// Enabled via the `logging` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let id = e.identity.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::FleetStarting => {
                info!(total = e.total, endpoint = reason, "fleet starting");
            }
            EventKind::FleetStopped => info!(quit = e.total, "fleet stopped"),
            EventKind::FleetSettled => match reason {
                "total_failure" => warn!(outcome = reason, total = e.total, "fleet settled, no client online; service stopped"),
                _ => info!(outcome = reason, online = e.online, total = e.total, "fleet settled"),
            },
            EventKind::ClientQueued => {
                debug!(identity = id, created = e.online, total = e.total, "client queued");
            }
            EventKind::ClientAdmitted => info!(identity = id, active = e.active, "client admitted"),
            EventKind::StateChanged => {
                let from = e.from.map(|s| s.as_str()).unwrap_or("-");
                let to = e.to.map(|s| s.as_str()).unwrap_or("-");
                info!(identity = id, from, to, reason, "state");
            }
            EventKind::TimeoutHit => {
                warn!(identity = id, attempt = e.attempt, timeout_ms = e.timeout_ms, "attempt timed out");
            }
            EventKind::BackoffScheduled => {
                warn!(identity = id, attempt = e.attempt, delay_ms = e.delay_ms, reason, "backoff");
            }
            EventKind::RetryExhausted => {
                warn!(identity = id, attempts = e.attempt, reason, "retries exhausted");
            }
            EventKind::ClientRestored => info!(identity = id, "client restored"),
            EventKind::MessageSent => {
                debug!(identity = id, text = e.text.as_deref().unwrap_or(""), "message sent");
            }
            EventKind::ChatReceived => {
                info!(from = reason, text = e.text.as_deref().unwrap_or(""), "chat");
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                warn!(reason, "subscriber");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClientState;

    #[tokio::test]
    async fn renders_every_kind_without_panicking() {
        let events = [
            Event::new(EventKind::FleetStarting).with_total(3).with_reason("localhost:25565"),
            Event::new(EventKind::FleetSettled).with_counts(0, 3).with_reason("total_failure"),
            Event::new(EventKind::StateChanged)
                .with_identity("bot_001")
                .with_transition(ClientState::Connecting, ClientState::Online),
            Event::new(EventKind::ChatReceived).with_reason("alice").with_text("hi"),
            Event::subscriber_overflow("log", "full"),
        ];
        for ev in &events {
            LogWriter.on_event(ev).await;
        }
    }
}
