//! CLI command implementations.

pub mod check;
pub mod get;
pub mod put;
pub mod serve;

use consus_client::{ClientConfig, ConnectOptions, Session};

/// Opens a session for the connection flags given on the command line.
pub fn open_session(options: &ConnectOptions) -> Result<Session, Box<dyn std::error::Error>> {
    let config = ClientConfig::from_connect_options(options)?;
    Ok(Session::from_config(config)?)
}

/// Renders bytes for display, replacing invalid UTF-8.
pub fn display_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
