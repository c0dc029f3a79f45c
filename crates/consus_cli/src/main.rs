//! Consus CLI
//!
//! Command-line tools for the Consus key-value store.
//!
//! # Commands
//!
//! - `serve` - Run the reference store
//! - `get` - Read one record in its own transaction
//! - `put` - Write one record in its own transaction
//! - `check` - Verify that the store answers
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use consus_client::ConnectOptions;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Consus key-value store tools.
#[derive(Parser)]
#[command(name = "consus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Connect to an IP address or hostname (default: 127.0.0.1)
    #[arg(global = true, short = 'H', long, value_name = "ADDR")]
    host: Option<String>,

    /// Connect to an alternative port (default: 1982)
    #[arg(global = true, short, long)]
    port: Option<u16>,

    /// Connect to a comma-separated list of hosts
    #[arg(global = true, short, long, value_name = "HOSTS")]
    cluster: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference store
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:1982")]
        bind: SocketAddr,

        /// How long a transaction waits for a lock held by an older one
        #[arg(long, default_value = "2000")]
        lock_timeout_ms: u64,

        /// Maximum concurrent connections
        #[arg(long, default_value = "1000")]
        max_connections: usize,
    },

    /// Read one record
    Get {
        /// Table name
        table: String,

        /// Key
        key: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write one record
    Put {
        /// Table name
        table: String,

        /// Key
        key: String,

        /// Value
        value: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that the store answers a begin/abort round trip
    Check,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let connect = ConnectOptions {
        host: cli.host,
        port: cli.port,
        cluster: cli.cluster,
    };

    match cli.command {
        Commands::Serve {
            bind,
            lock_timeout_ms,
            max_connections,
        } => {
            commands::serve::run(bind, lock_timeout_ms, max_connections)?;
        }
        Commands::Get { table, key, format } => {
            commands::get::run(&connect, &table, &key, &format)?;
        }
        Commands::Put {
            table,
            key,
            value,
            format,
        } => {
            commands::put::run(&connect, &table, &key, &value, &format)?;
        }
        Commands::Check => {
            commands::check::run(&connect)?;
        }
        Commands::Version => {
            println!("Consus CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn connection_flags_are_global() {
        let cli = Cli::try_parse_from(["consus", "get", "t", "k", "-H", "db1", "-p", "2000"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("db1"));
        assert_eq!(cli.port, Some(2000));
        assert!(matches!(cli.command, Commands::Get { .. }));
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["consus", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                bind,
                lock_timeout_ms,
                ..
            } => {
                assert_eq!(bind.to_string(), "127.0.0.1:1982");
                assert_eq!(lock_timeout_ms, 2000);
            }
            _ => panic!("expected serve"),
        }
    }
}
