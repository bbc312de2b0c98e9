//! Command-line arguments.

use std::time::Duration;

use clap::Parser;
use parley_client::SessionConfig;
use parley_core::{ConnectionConfig, ReconnectPolicy};

/// Parley terminal chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Chat through a Parley relay from the terminal")]
#[command(version)]
pub struct Args {
    /// Relay URL (`ws://` or `wss://`)
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    pub relay: String,

    /// Display name to join with
    ///
    /// If not provided, the first line typed is used.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Seconds to wait before reconnecting
    #[arg(long, default_value = "5")]
    pub reconnect_delay: u64,

    /// Cap for exponential backoff, in seconds (enables backoff)
    #[arg(long)]
    pub max_reconnect_delay: Option<u64>,

    /// Give up after this many consecutive reconnect attempts
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    /// Seconds a join may wait for the relay
    #[arg(long, default_value = "10")]
    pub join_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Session configuration described by the flags.
    pub fn session_config(&self) -> SessionConfig {
        let delay = Duration::from_secs(self.reconnect_delay);
        let mut reconnect = match self.max_reconnect_delay {
            Some(max) => ReconnectPolicy::exponential(delay, Duration::from_secs(max)),
            None => ReconnectPolicy::fixed(delay),
        };
        if let Some(attempts) = self.max_reconnect_attempts {
            reconnect = reconnect.with_max_attempts(attempts);
        }

        SessionConfig {
            connection: ConnectionConfig { reconnect, ..ConnectionConfig::default() },
            join_timeout: Duration::from_secs(self.join_timeout),
            ..SessionConfig::default()
        }
    }
}
