//! Client configuration.

use crate::address::{parse_endpoints, ConnectOptions, Endpoint};
use crate::error::ClientResult;
use consus_protocol::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

/// Connection settings for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint strings; each may itself be a comma-separated list.
    /// Empty means the default host.
    pub endpoints: Vec<String>,
    /// Port used for entries that do not name one.
    pub default_port: u16,
    /// Timeout for establishing a connection to one endpoint.
    pub connect_timeout: Duration,
    /// Timeout for a single request round trip. Must exceed the store's lock
    /// wait timeout, since `put` may block on a lock.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration pointing at the default endpoint.
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            default_port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Adds an endpoint string.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Sets the default port.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds a configuration from command-line style connect options.
    pub fn from_connect_options(options: &ConnectOptions) -> ClientResult<Self> {
        let endpoints = options.endpoints()?;
        Ok(Self::new().with_endpoint(crate::address::join(&endpoints)))
    }

    /// Resolves the endpoint strings into endpoints, in order.
    pub fn resolve(&self) -> ClientResult<Vec<Endpoint>> {
        if self.endpoints.is_empty() {
            return Ok(vec![Endpoint::new(DEFAULT_HOST, self.default_port)]);
        }
        let mut resolved = Vec::new();
        for entry in &self.endpoints {
            resolved.extend(parse_endpoints(entry, self.default_port)?);
        }
        Ok(resolved)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves_to_loopback() {
        let config = ClientConfig::default();
        assert_eq!(config.resolve().unwrap(), vec![Endpoint::new("127.0.0.1", 1982)]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn default_port_applies_to_bare_hosts() {
        let config = ClientConfig::new()
            .with_endpoint("a,b:7")
            .with_endpoint("c")
            .with_default_port(4000);
        assert_eq!(
            config.resolve().unwrap(),
            vec![
                Endpoint::new("a", 4000),
                Endpoint::new("b", 7),
                Endpoint::new("c", 4000),
            ]
        );
    }

    #[test]
    fn bad_entry_fails_resolution() {
        let config = ClientConfig::new().with_endpoint("ok").with_endpoint("bad:port");
        assert!(config.resolve().is_err());
    }

    #[test]
    fn from_options() {
        let options = ConnectOptions::new().with_cluster("[::1]:5,h");
        let config = ClientConfig::from_connect_options(&options).unwrap();
        assert_eq!(
            config.resolve().unwrap(),
            vec![Endpoint::new("::1", 5), Endpoint::new("h", 1982)]
        );
    }
}
