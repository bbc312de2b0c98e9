//! Parley terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Join immediately
//! parley --relay ws://127.0.0.1:8080 --name alice
//!
//! # Type the display name at the prompt instead
//! parley --relay wss://chat.example.com/ws
//! ```
//!
//! Lines typed are sent as messages. `/join <name>`, `/leave` and `/quit`
//! are commands.

use clap::Parser;
use parley_app::{Intent, Runtime, system_env::SystemEnv, transport::WsDriver};
use parley_cli::{Args, InputParser, TerminalObserver};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the chat itself
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing::info!(relay = %args.relay, "parley starting");

    let (driver, intents) = WsDriver::new(args.relay.clone());
    let mut observer = TerminalObserver::stdout();

    match &args.name {
        Some(name) => intents.send(Intent::Join { display_name: name.clone() }).await?,
        None => observer.notice("enter a display name"),
    }
    tokio::spawn(read_stdin(intents, InputParser::new(args.name.is_none())));

    let runtime = Runtime::new(driver, SystemEnv::new(), observer, args.session_config());
    runtime.run().await?;

    Ok(())
}

/// Forward stdin lines as intents until EOF or `/quit`.
///
/// Returning drops the sender, which stops the runtime.
async fn read_stdin(intents: mpsc::Sender<Intent>, mut parser: InputParser) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stdin");
                return;
            },
        };

        let Some(intent) = parser.parse(&line) else {
            continue;
        };
        let quit = intent == Intent::Quit;
        if intents.send(intent).await.is_err() || quit {
            return;
        }
    }
}
