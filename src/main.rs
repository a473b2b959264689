//! kafkaconn - issue Kafka requests over one multiplexed broker connection
//!
//! Each subcommand opens a connection, sends one request and prints the
//! decoded response as JSON.

mod config;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use config::Config;
use kafkaconn_client::{ClientError, Connection};
use kafkaconn_protocol::message::*;
use kafkaconn_protocol::Message;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kafkaconn")]
#[command(about = "Send Kafka requests over a single multiplexed broker connection")]
#[command(version)]
struct Cli {
    /// Broker address (host:port)
    #[arg(short, long)]
    broker: Option<String>,

    /// Client id sent in request headers (empty for none)
    #[arg(long)]
    client_id: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// YAML config file
    #[arg(short, long, env = "KAFKACONN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch cluster metadata
    Metadata {
        /// Topics to describe (all topics if omitted)
        topics: Vec<String>,
    },

    /// Produce messages to one partition
    Produce {
        topic: String,

        #[arg(short, long, default_value_t = 0)]
        partition: i32,

        /// Key applied to every message
        #[arg(short, long)]
        key: Option<String>,

        /// Acknowledgement level
        #[arg(long, value_enum, default_value_t = Acks::Leader)]
        acks: Acks,

        /// Message values
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Fetch messages from one partition
    Fetch {
        topic: String,

        #[arg(short, long, default_value_t = 0)]
        partition: i32,

        /// First offset to return
        #[arg(short, long, default_value_t = 0)]
        offset: i64,

        #[arg(long, default_value_t = 1024 * 1024)]
        max_bytes: i32,

        #[arg(long, default_value_t = 500)]
        max_wait_ms: i32,
    },

    /// Look up a partition offset
    Offsets {
        topic: String,

        #[arg(short, long, default_value_t = 0)]
        partition: i32,

        /// Oldest retained offset instead of the latest
        #[arg(long, conflicts_with = "timestamp")]
        earliest: bool,

        /// First offset at or after this timestamp (ms since epoch)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Find the coordinator of a consumer group
    Coordinator { group: String },

    /// Commit a consumer group offset
    Commit {
        group: String,
        topic: String,
        partition: i32,
        offset: i64,

        #[arg(long)]
        metadata: Option<String>,
    },

    /// Show a consumer group's committed offset
    Committed {
        group: String,
        topic: String,
        partition: i32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Acks {
    None,
    Leader,
    All,
}

impl From<Acks> for RequiredAcks {
    fn from(acks: Acks) -> Self {
        match acks {
            Acks::None => RequiredAcks::None,
            Acks::Leader => RequiredAcks::Leader,
            Acks::All => RequiredAcks::All,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("{}: {}", "Config error".red(), e);
        e
    })?;
    if let Some(broker) = cli.broker {
        config.broker = broker;
    }
    if let Some(client_id) = cli.client_id {
        config.client_id = client_id;
    }
    if let Some(ms) = cli.timeout_ms {
        config.request_timeout_ms = ms;
    }
    config.validate()?;

    let conn = Connection::connect(config.connection_config())
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;
    tracing::debug!(
        "connected to {} at {}",
        conn.addr(),
        conn.established_at().to_rfc3339()
    );

    let result = run(&conn, cli.command, config.request_timeout()).await;
    if let Err(e) = conn.close().await {
        tracing::warn!("close failed: {}", e);
    }

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}

async fn run(
    conn: &Connection,
    command: Commands,
    timeout: Duration,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::Metadata { topics } => {
            let response = bounded(timeout, conn.metadata(&MetadataRequest::new(topics))).await?;
            render(&response)?
        }
        Commands::Produce {
            topic,
            partition,
            key,
            acks,
            values,
        } => {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let count = values.len();
            let messages = values
                .into_iter()
                .map(|value| {
                    let message = Message::new(value).with_timestamp(timestamp);
                    match &key {
                        Some(key) => message.with_key(key.clone()),
                        None => message,
                    }
                })
                .collect();
            let request =
                ProduceRequest::new(acks.into()).with_messages(&topic, partition, messages);

            match bounded(timeout, conn.produce(&request)).await? {
                Some(response) => render(&response)?,
                None => render(&serde_json::json!({ "sent": count, "acks": "none" }))?,
            }
        }
        Commands::Fetch {
            topic,
            partition,
            offset,
            max_bytes,
            max_wait_ms,
        } => {
            let mut request =
                FetchRequest::new().with_partition(&topic, partition, offset, max_bytes);
            request.max_wait_ms = max_wait_ms;
            request.max_bytes = max_bytes;
            render(&bounded(timeout, conn.fetch(&request)).await?)?
        }
        Commands::Offsets {
            topic,
            partition,
            earliest,
            timestamp,
        } => {
            let timestamp = match (earliest, timestamp) {
                (true, _) => EARLIEST_OFFSET,
                (false, Some(ts)) => ts,
                (false, None) => LATEST_OFFSET,
            };
            let request = OffsetRequest::new().with_partition(&topic, partition, timestamp);
            render(&bounded(timeout, conn.offset(&request)).await?)?
        }
        Commands::Coordinator { group } => {
            let request = GroupCoordinatorRequest::new(group);
            render(&bounded(timeout, conn.group_coordinator(&request)).await?)?
        }
        Commands::Commit {
            group,
            topic,
            partition,
            offset,
            metadata,
        } => {
            let request =
                OffsetCommitRequest::new(group).with_offset(&topic, partition, offset, metadata);
            render(&bounded(timeout, conn.offset_commit(&request)).await?)?
        }
        Commands::Committed {
            group,
            topic,
            partition,
        } => {
            let request = OffsetFetchRequest::new(group).with_partition(&topic, partition);
            render(&bounded(timeout, conn.offset_fetch(&request)).await?)?
        }
    };
    Ok(output)
}

/// Races a request against the configured timeout.
async fn bounded<T>(
    timeout: Duration,
    request: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| ClientError::Timeout)?
}

fn render<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
