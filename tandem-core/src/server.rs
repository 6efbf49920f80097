//! Broker server identity.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Port used when a server address carries none.
pub const DEFAULT_PORT: u16 = 5672;

/// One broker endpoint in the publisher pool.
///
/// Servers are compared by `(host, port)` only and never change after
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Server {
    host: String,
    port: u16,
}

impl Server {
    /// Create a server identity.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Parse a list of `host[:port]` strings, failing on the first bad entry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidServer`] if any entry cannot be parsed.
    pub fn parse_list<I, S>(addresses: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addresses.into_iter().map(|a| a.as_ref().parse()).collect()
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|e| Error::InvalidServer(format!("{address}: bad port: {e}")))
}

impl FromStr for Server {
    type Err = Error;

    /// Accepts `host`, `host:port`, `[ipv6]` and `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::InvalidServer(format!("{s}: missing closing bracket")))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => match tail.strip_prefix(':') {
                    Some(port) => parse_port(s, port)?,
                    None => return Err(Error::InvalidServer(format!("{s}: junk after host"))),
                },
            };
            (host, port)
        } else {
            let (host, port) = match s.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(s, port)?),
                None => (s, DEFAULT_PORT),
            };
            if host.contains(':') {
                return Err(Error::InvalidServer(format!("{s}: IPv6 hosts must be bracketed")));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(Error::InvalidServer(format!("{s}: empty host")));
        }
        if port == 0 {
            return Err(Error::InvalidServer(format!("{s}: port must be non-zero")));
        }

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Server {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Server> for String {
    fn from(server: Server) -> Self {
        server.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_port() {
        let server: Server = "rabbit1.local:5673".parse().unwrap();
        assert_eq!(server.host(), "rabbit1.local");
        assert_eq!(server.port(), 5673);
        assert_eq!(server.to_string(), "rabbit1.local:5673");
    }

    #[test]
    fn test_parse_defaults_port() {
        let server: Server = "localhost".parse().unwrap();
        assert_eq!(server, Server::new("localhost", DEFAULT_PORT));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("host:notaport".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!(":5672".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!("host:0".parse::<Server>(), Err(Error::InvalidServer(_))));
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let server: Server = "[::1]:5673".parse().unwrap();
        assert_eq!(server, Server::new("::1", 5673));
        assert_eq!(server.to_string(), "[::1]:5673");
        assert_eq!(server.to_string().parse::<Server>().unwrap(), server);

        let server: Server = "[fe80::2]".parse().unwrap();
        assert_eq!(server, Server::new("fe80::2", DEFAULT_PORT));
    }

    #[test]
    fn test_parse_rejects_bare_ipv6() {
        assert!(matches!("::1".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!("fe80::2:5672".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!("[::1".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!("[::1]5672".parse::<Server>(), Err(Error::InvalidServer(_))));
        assert!(matches!("[]:5672".parse::<Server>(), Err(Error::InvalidServer(_))));
    }

    #[test]
    fn test_equality_is_by_identity() {
        let a = Server::new("a", 5672);
        assert_eq!(a, "a:5672".parse().unwrap());
        assert_ne!(a, Server::new("a", 5673));
    }

    #[test]
    fn test_parse_list() {
        let servers = Server::parse_list(["a:1", "b"]).unwrap();
        assert_eq!(servers, vec![Server::new("a", 1), Server::new("b", DEFAULT_PORT)]);
        assert!(Server::parse_list(["a:1", "b:x"]).is_err());
    }
}
