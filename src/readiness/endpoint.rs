//! Service endpoints probed for readiness.

use crate::error::{ProvisionError, Result};
use crate::readiness::probe::HTTP_PING_PATH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application-level handshake used to decide an endpoint is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Accepting TCP connections is enough.
    Tcp,
    /// HTTP server answering the framework's ping route.
    Http,
    /// MySQL/MariaDB server sending its protocol greeting.
    Mysql,
    /// Redis server answering `PING`.
    Redis,
}

impl Protocol {
    /// URL-style scheme name.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Http => "http",
            Protocol::Mysql => "mysql",
            Protocol::Redis => "redis",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "http" => Ok(Protocol::Http),
            "mysql" | "mariadb" => Ok(Protocol::Mysql),
            "redis" => Ok(Protocol::Redis),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A network service the sequencer waits on.
///
/// Written in configuration as `[scheme://]host:port[/path]`; without a scheme
/// the caller's default protocol applies (see [`ServiceEndpoint::parse_with_default`]).
/// A path is only meaningful for HTTP, where it replaces the default ping route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Request path for HTTP probes.
    pub path: Option<String>,
}

impl ServiceEndpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            path: None,
        }
    }

    /// Probe `path` instead of the default ping route.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Path requested by an HTTP probe.
    pub fn http_path(&self) -> &str {
        self.path.as_deref().unwrap_or(HTTP_PING_PATH)
    }

    /// Parse `[scheme://]host:port[/path]`, using `default` when no scheme is given.
    pub fn parse_with_default(input: &str, default: Protocol) -> Result<Self> {
        let invalid = |reason: &str| ProvisionError::Configuration {
            message: format!("invalid endpoint '{}': {}", input, reason),
        };

        let input = input.trim();
        let (protocol, rest) = match input.split_once("://") {
            Some((scheme, rest)) => (scheme.parse::<Protocol>().map_err(|e| invalid(&e))?, rest),
            None => (default, input),
        };
        let (rest, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], Some(&rest[idx..])),
            None => (rest, None),
        };
        let path = path.filter(|p| *p != "/");
        if path.is_some() && protocol != Protocol::Http {
            return Err(invalid("a path is only allowed for http endpoints"));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port must be 1-65535"))?;
        if port == 0 {
            return Err(invalid("port must be 1-65535"));
        }

        let endpoint = Self::new(host, port, protocol);
        Ok(match path {
            Some(path) => endpoint.with_path(path),
            None => endpoint,
        })
    }

    /// `host:port` form suitable for socket address resolution.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServiceEndpoint {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_with_default(s, Protocol::Tcp)
    }
}

impl TryFrom<String> for ServiceEndpoint {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ServiceEndpoint> for String {
    fn from(endpoint: ServiceEndpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address())?;
        if let Some(path) = &self.path {
            f.write_str(path)?;
        }
        Ok(())
    }
}
