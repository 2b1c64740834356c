//! Network address of a cluster member.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{HazelcastError, Result};

/// Port a member listens on when an address omits one.
pub const DEFAULT_PORT: u16 = 5701;

/// A host name or IP literal plus a port.
///
/// Unlike `SocketAddr`, the host is kept as written so that members
/// advertised by name stay comparable with configured seed addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Creates an address from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves this address to the first matching socket address.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port)).await?;
        addrs.next().ok_or_else(|| {
            HazelcastError::Connection(format!("could not resolve address {}", self))
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for Address {
    type Err = HazelcastError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HazelcastError::Configuration("empty address".to_string()));
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        // Bracketed IPv6 without a port.
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return Ok(Self::new(inner, DEFAULT_PORT));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port.parse::<u16>().map_err(|_| {
                    HazelcastError::Configuration(format!("invalid port in address '{}'", s))
                })?;
                if host.is_empty() {
                    return Err(HazelcastError::Configuration(format!(
                        "missing host in address '{}'",
                        s
                    )));
                }
                Ok(Self::new(host, port))
            }
            _ => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}
