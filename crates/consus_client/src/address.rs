//! Endpoint parsing.
//!
//! Accepted forms, alone or as a comma-separated list:
//!
//! - `host`
//! - `host:port`
//! - `[ipv6]` and `[ipv6]:port`
//! - a bare IPv6 literal such as `::1`
//!
//! Hosts are IP literals or RFC 1123 host names. Input may be given as text
//! or as bytes; both must be UTF-8 and are treated identically.

use crate::error::{ClientError, ClientResult};
use consus_protocol::{DEFAULT_HOST, DEFAULT_PORT};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// One store endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP literal, without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns true if the host is an IPv6 literal.
    pub fn is_ipv6(&self) -> bool {
        self.host.parse::<Ipv6Addr>().is_ok()
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses an endpoint list, filling in `default_port` where none is given.
pub fn parse_endpoints(input: impl AsRef<[u8]>, default_port: u16) -> ClientResult<Vec<Endpoint>> {
    Ok(parse_entries(decode_utf8(input.as_ref())?, default_port)?
        .into_iter()
        .map(|(endpoint, _)| endpoint)
        .collect())
}

/// Parses a single host that is paired with a separately supplied port.
///
/// The host must not carry a port of its own and must not be a list.
pub fn parse_host_with_port(host: impl AsRef<[u8]>, port: u16) -> ClientResult<Endpoint> {
    let text = decode_utf8(host.as_ref())?;
    let mut entries = parse_entries(text, port)?;
    if entries.len() != 1 {
        return Err(ClientError::configuration(format!(
            "port {port} given separately for a list of {} endpoints",
            entries.len()
        )));
    }
    match entries.pop() {
        Some((endpoint, false)) => Ok(endpoint),
        Some((endpoint, true)) => Err(ClientError::configuration(format!(
            "port given twice: {endpoint} and {port}"
        ))),
        None => Err(ClientError::configuration("empty address")),
    }
}

/// Connection options in the style of the `-H/-p/-c` command-line flags.
///
/// A host and/or port names a single endpoint, the cluster string names a
/// list. When both are given the single endpoint is appended to the list;
/// when neither is given the default endpoint is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Single host to connect to.
    pub host: Option<String>,
    /// Port for the single host.
    pub port: Option<u16>,
    /// Comma-separated list of `host[:port]` entries.
    pub cluster: Option<String>,
}

impl ConnectOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the single host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port of the single host.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the cluster list.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Returns true if any option was given.
    pub fn is_set(&self) -> bool {
        self.host.is_some() || self.port.is_some() || self.cluster.is_some()
    }

    /// Resolves the options to the endpoint list to connect to.
    pub fn endpoints(&self) -> ClientResult<Vec<Endpoint>> {
        let single = if self.host.is_some() || self.port.is_some() {
            let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
            let port = self.port.unwrap_or(DEFAULT_PORT);
            if port == 0 {
                return Err(ClientError::configuration("port must be in 1-65535"));
            }
            Some(parse_host_with_port(host, port)?)
        } else {
            None
        };

        let mut endpoints = match &self.cluster {
            Some(cluster) => parse_endpoints(cluster, DEFAULT_PORT)?,
            None => Vec::new(),
        };
        if let Some(endpoint) = single {
            endpoints.push(endpoint);
        }
        if endpoints.is_empty() {
            endpoints.push(Endpoint::default());
        }
        Ok(endpoints)
    }

    /// Renders the resolved endpoints as a connection string.
    pub fn connection_string(&self) -> ClientResult<String> {
        Ok(join(&self.endpoints()?))
    }
}

/// Renders endpoints as a comma-separated connection string.
pub fn join(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(Endpoint::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn decode_utf8(input: &[u8]) -> ClientResult<&str> {
    std::str::from_utf8(input)
        .map_err(|_| ClientError::configuration("address is not valid UTF-8"))
}

/// Parses every entry; the flag records whether the entry named its own port.
fn parse_entries(input: &str, default_port: u16) -> ClientResult<Vec<(Endpoint, bool)>> {
    if input.trim().is_empty() {
        return Err(ClientError::configuration("empty address"));
    }
    input
        .split(',')
        .map(|entry| parse_entry(entry.trim(), default_port))
        .collect()
}

fn parse_entry(entry: &str, default_port: u16) -> ClientResult<(Endpoint, bool)> {
    if entry.is_empty() {
        return Err(ClientError::configuration("empty entry in address list"));
    }

    if let Some(rest) = entry.strip_prefix('[') {
        let (literal, tail) = rest.split_once(']').ok_or_else(|| {
            ClientError::configuration(format!("unterminated bracket in {entry:?}"))
        })?;
        literal.parse::<Ipv6Addr>().map_err(|_| {
            ClientError::configuration(format!("{literal:?} is not an IPv6 address"))
        })?;
        return match tail {
            "" => Ok((Endpoint::new(literal, default_port), false)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((Endpoint::new(literal, parse_port(port)?), true)),
                None => Err(ClientError::configuration(format!(
                    "unexpected {tail:?} after bracketed address"
                ))),
            },
        };
    }

    if entry.parse::<Ipv6Addr>().is_ok() {
        return Ok((Endpoint::new(entry, default_port), false));
    }

    match entry.rsplit_once(':') {
        Some((host, port)) => {
            validate_host(host)?;
            Ok((Endpoint::new(host, parse_port(port)?), true))
        }
        None => {
            validate_host(entry)?;
            Ok((Endpoint::new(entry, default_port), false))
        }
    }
}

fn parse_port(text: &str) -> ClientResult<u16> {
    match text.parse::<u16>() {
        Ok(0) | Err(_) => Err(ClientError::configuration(format!(
            "invalid port {text:?}: must be in 1-65535"
        ))),
        Ok(port) => Ok(port),
    }
}

fn validate_host(host: &str) -> ClientResult<()> {
    if host.parse::<Ipv4Addr>().is_ok() || is_hostname(host) {
        Ok(())
    } else {
        Err(ClientError::configuration(format!("invalid host {host:?}")))
    }
}

fn is_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}
