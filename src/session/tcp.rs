//! # Line-oriented TCP sessions.
//!
//! [`TcpLineFactory`] is the simplest real [`SessionFactory`]: each client opens
//! a TCP connection, logs in by writing its identity as the first line, and
//! exchanges newline-terminated text afterwards.
//!
//! ## Event mapping
//! ```text
//! connect ok            → Connecting
//! login line written    → Ready
//! inbound "who: text"   → Chat { from: who, text }     (own lines skipped)
//! inbound other line    → Chat { from: "server", text }
//! EOF                   → Disconnected
//! io error / timeout    → Fault
//! close()               → connection task cancelled, nothing more reported
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::{OpenRequest, Session, SessionEvent, SessionFactory, SessionSink};
use crate::error::SessionError;

/// Opens plain TCP line sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpLineFactory;

impl TcpLineFactory {
    /// Creates a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for TcpLineFactory {
    fn open(&self, request: OpenRequest, sink: SessionSink) -> Box<dyn Session> {
        let cancel = CancellationToken::new();
        let ready = Arc::new(AtomicBool::new(false));
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();

        let conn = Connection {
            request,
            sink,
            cancel: cancel.clone(),
            ready: Arc::clone(&ready),
        };
        tokio::spawn(conn.run(out_rx));

        Box::new(TcpLineSession {
            cancel,
            ready,
            out: out_tx,
        })
    }
}

/// Handle kept by the fleet driver.
struct TcpLineSession {
    cancel: CancellationToken,
    ready: Arc<AtomicBool>,
    out: mpsc::UnboundedSender<String>,
}

impl Session for TcpLineSession {
    fn send(&mut self, text: &str) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        if !self.ready.load(Ordering::Acquire) {
            return Err(SessionError::NotReady);
        }
        self.out
            .send(text.to_string())
            .map_err(|_| SessionError::Closed)
    }

    fn close(&mut self) {
        self.ready.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}

impl Drop for TcpLineSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Background half of one session.
struct Connection {
    request: OpenRequest,
    sink: SessionSink,
    cancel: CancellationToken,
    ready: Arc<AtomicBool>,
}

impl Connection {
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<String>) {
        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return,
            res = self.connect() => match res {
                Ok(stream) => stream,
                Err(e) => {
                    self.sink.emit(SessionEvent::Fault { reason: e.to_string() });
                    return;
                }
            }
        };
        self.sink.emit(SessionEvent::Connecting);

        let (rd, mut wr) = stream.into_split();
        let login = format!("{}\n", self.request.identity);
        if let Err(e) = wr.write_all(login.as_bytes()).await {
            self.sink.emit(SessionEvent::Fault { reason: e.to_string() });
            return;
        }
        self.ready.store(true, Ordering::Release);
        self.sink.emit(SessionEvent::Ready);

        let mut lines = BufReader::new(rd).lines();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = wr.shutdown().await;
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.on_line(&line),
                    Ok(None) => {
                        self.sink.emit(SessionEvent::Disconnected { reason: "closed by peer".into() });
                        break;
                    }
                    Err(e) => {
                        self.sink.emit(SessionEvent::Fault { reason: e.to_string() });
                        break;
                    }
                },
                msg = outbound.recv() => match msg {
                    Some(text) => {
                        let framed = format!("{text}\n");
                        if let Err(e) = wr.write_all(framed.as_bytes()).await {
                            self.sink.emit(SessionEvent::Fault { reason: e.to_string() });
                            break;
                        }
                    }
                    // Handle dropped without close().
                    None => break,
                },
            }
        }
        self.ready.store(false, Ordering::Release);
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let ep = &self.request.endpoint;
        let connect = TcpStream::connect((ep.host.as_str(), ep.port));
        match self.request.connect_timeout {
            Some(limit) => time::timeout(limit, connect)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?,
            None => connect.await,
        }
    }

    fn on_line(&self, line: &str) {
        if !self.request.listener {
            return;
        }
        let (from, text) = split_chat(line);
        if from == self.request.identity.as_str() {
            return;
        }
        self.sink.emit(SessionEvent::Chat {
            from: from.to_string(),
            text: text.to_string(),
        });
    }
}

/// Splits `who: text` into its parts; lines without an author are attributed to `server`.
fn split_chat(line: &str) -> (&str, &str) {
    match line.split_once(": ") {
        Some((who, text)) if !who.is_empty() && !who.contains(char::is_whitespace) => (who, text),
        _ => ("server", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_lines_are_split_on_author() {
        assert_eq!(split_chat("alice: hi there"), ("alice", "hi there"));
        assert_eq!(split_chat("Server restarting soon"), ("server", "Server restarting soon"));
        assert_eq!(split_chat("two words: nope"), ("server", "two words: nope"));
    }
}
