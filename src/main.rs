//! CLI for TopicRelay
//!
//! Subcommands:
//! - `server`: run the relay on a TCP port
//! - `client`: connect as a publisher or subscriber

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use topicrelay::client::{self, ClientOptions};
use topicrelay::config::{Settings, load_config, load_config_from};
use topicrelay::session::Role;
use topicrelay::utils::logging;
use topicrelay::{Registry, RelayError, start_server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "topicrelay", version, about = "Publish/subscribe relay over TCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the relay server
    Server {
        /// TCP port to listen on
        port: u16,
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Config file (defaults to config/default.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Single-channel mode: clients send no topic line
        #[arg(long)]
        no_topics: bool,
    },
    /// Connect to a relay as a publisher or subscriber
    Client {
        /// Relay host
        host: String,
        /// Relay port
        port: u16,
        /// PUBLISHER or SUBSCRIBER (any case)
        role: Role,
        /// Topic to publish or subscribe on; omit for single-channel relays
        topic: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Server {
            port,
            host,
            config,
            no_topics,
        } => run_server(port, host, config, no_topics).await,
        Command::Client {
            host,
            port,
            role,
            topic,
        } => {
            logging::init("warn");
            client::run(ClientOptions {
                host,
                port,
                role,
                topic,
            })
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(
    port: u16,
    host: Option<String>,
    config: Option<PathBuf>,
    no_topics: bool,
) -> Result<(), RelayError> {
    let mut settings: Settings = match config {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    settings.server.port = port;
    if let Some(host) = host {
        settings.server.host = host;
    }
    if no_topics {
        settings.relay.topics_enabled = false;
    }

    logging::init(&settings.log.level);
    info!(
        topics_enabled = settings.relay.topics_enabled,
        prune_empty_topics = settings.relay.prune_empty_topics,
        "Starting relay on {}",
        settings.bind_addr()
    );

    let registry =
        Arc::new(Registry::new().with_topic_pruning(settings.relay.prune_empty_topics));

    start_server(&settings, registry, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}
