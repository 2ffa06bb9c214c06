//! Small value types shared by the core: client identity, server endpoint and
//! the resume ticket carried by every deferred callback.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::EndpointError;

/// Port used when an endpoint is given without one.
pub const DEFAULT_PORT: u16 = 25565;

/// Width of the zero-padded index in derived identities (`bot_001`).
const INDEX_WIDTH: usize = 3;

/// Immutable client name, unique within a fleet generation.
///
/// Cheap to clone (`Arc<str>`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    /// Derives the identity of the `index`-th client (1-based) of a fleet.
    ///
    /// ```
    /// use fleetvisor::Identity;
    ///
    /// assert_eq!(Identity::derive("bot_", 7).as_str(), "bot_007");
    /// assert_eq!(Identity::derive("bot_", 1234).as_str(), "bot_1234");
    /// ```
    pub fn derive(prefix: &str, index: usize) -> Self {
        Self(format!("{prefix}{index:0width$}", width = INDEX_WIDTH).into())
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identity {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&Identity> for Identity {
    fn from(id: &Identity) -> Self {
        id.clone()
    }
}

impl From<Identity> for Arc<str> {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Server address every client of a generation connects to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint from parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parses `host`, `host:port`, `[ipv6]` or `[ipv6]:port`; the port
    /// defaults to [`DEFAULT_PORT`]. A bare IPv6 literal is a host without port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or(EndpointError::UnclosedBracket)?;
            match tail {
                "" => (host, None),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => {
                        return Err(EndpointError::InvalidPort {
                            port: tail.to_string(),
                        });
                    }
                },
            }
        } else {
            match s.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                _ => (s, None),
            }
        };
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| EndpointError::InvalidPort {
                port: port.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Resume token captured when a callback is scheduled.
///
/// A callback is honoured only if all three parts still match live state:
/// - `generation`: the fleet has not been stopped or restarted since;
/// - `incarnation`: the record has not been replaced by `restore`;
/// - `epoch`: the record has not abandoned the attempt (failure, drop, manual quit).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Fleet generation id.
    pub generation: u64,
    /// Record incarnation, unique across the driver's lifetime.
    pub incarnation: u64,
    /// Attempt epoch within the record.
    pub epoch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_port() {
        let ep: Endpoint = "localhost".parse().unwrap();
        assert_eq!(ep, Endpoint::new("localhost", DEFAULT_PORT));
    }

    #[test]
    fn endpoint_parses_port() {
        let ep: Endpoint = "10.0.0.2:25570".parse().unwrap();
        assert_eq!(ep.to_string(), "10.0.0.2:25570");
    }

    #[test]
    fn endpoint_rejects_bad_input() {
        assert_eq!(":25565".parse::<Endpoint>(), Err(EndpointError::EmptyHost));
        assert!(matches!(
            "host:abc".parse::<Endpoint>(),
            Err(EndpointError::InvalidPort { .. })
        ));
    }

    #[test]
    fn endpoint_accepts_ipv6_literals() {
        let ep: Endpoint = "[::1]:25570".parse().unwrap();
        assert_eq!(ep, Endpoint::new("::1", 25570));
        assert_eq!(ep.to_string(), "[::1]:25570");

        assert_eq!("[fe80::2]".parse::<Endpoint>().unwrap(), Endpoint::new("fe80::2", DEFAULT_PORT));
        assert_eq!("::1".parse::<Endpoint>().unwrap(), Endpoint::new("::1", DEFAULT_PORT));
        assert_eq!("[::1".parse::<Endpoint>(), Err(EndpointError::UnclosedBracket));
        assert!(matches!("[::1]x".parse::<Endpoint>(), Err(EndpointError::InvalidPort { .. })));
        assert_eq!("[]:25565".parse::<Endpoint>(), Err(EndpointError::EmptyHost));
    }

    #[test]
    fn identity_is_zero_padded() {
        assert_eq!(Identity::derive("b", 1).to_string(), "b001");
        assert_eq!(Identity::derive("b", 42).to_string(), "b042");
    }
}
