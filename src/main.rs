//! CLI for udpsub
//!
//! Subcommands:
//! - `registry`: run the registry on its configured address
//! - `subscribe`: register for topics and print what is accepted until Ctrl-C
//! - `publish`: send one message to a topic and report whether it got through

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use udpsub::config::{Settings, load_config};
use udpsub::node::Node;
use udpsub::protocol::{MessageId, Priority, QosLevel};
use udpsub::registry::start_registry_server;
use udpsub::subscriber::{SubscriberOptions, SubscriptionFilter};
use udpsub::utils::logging;

#[derive(Parser)]
#[command(name = "udpsub")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the registry
    Registry,
    /// Subscribe to one or more topics
    Subscribe {
        #[arg(long = "topic", required = true)]
        topics: Vec<String>,
        /// Accept only content containing this text (case-sensitive)
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        high_priority_only: bool,
        /// Drop messages older than this many seconds
        #[arg(long)]
        time_limit_secs: Option<u64>,
    },
    /// Publish a single message
    Publish {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        id: MessageId,
        #[arg(long, default_value = "MEDIUM")]
        priority: Priority,
        /// at-most-once, at-least-once or exactly-once (or 0, 1, 2)
        #[arg(long, default_value = "at-least-once")]
        qos: QosLevel,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Registry => run_registry().await,
        Command::Subscribe {
            topics,
            keyword,
            high_priority_only,
            time_limit_secs,
        } => run_subscriber(topics, keyword, high_priority_only, time_limit_secs).await,
        Command::Publish {
            topic,
            content,
            id,
            priority,
            qos,
        } => run_publisher(&topic, &content, id, priority, qos).await,
    };

    if let Err(e) = result {
        error!("udpsub failed: {}", e);
        std::process::exit(1);
    }
}

fn registry_addr(settings: &Settings) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    Ok(settings.registry.address().parse()?)
}

async fn run_registry() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    tokio::select! {
        result = start_registry_server(&config.registry) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
    Ok(())
}

async fn run_subscriber(
    topics: Vec<String>,
    keyword: Option<String>,
    high_priority_only: bool,
    time_limit_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = registry_addr(&config)?;

    // command-line filters override the configured ones
    let mut filter = SubscriptionFilter::from_settings(&config.subscriber);
    if let Some(keyword) = keyword {
        filter = filter.keyword(&keyword);
    }
    if high_priority_only {
        filter = filter.high_priority_only(true);
    }
    if let Some(secs) = time_limit_secs {
        filter = filter.time_limit(Duration::from_secs(secs));
    }

    let node = Node::bind_with_fallback(
        &Node::generate_name("subscriber"),
        &config.subscriber.host,
        config.subscriber.port,
        config.subscriber.port_scan_end,
    )
    .await?;
    let options = SubscriberOptions::from_settings(topics, &config.subscriber).filter(filter);
    let subscriber = node.create_subscriber(registry, options).await?;
    info!(addr = %node.local_addr()?, "subscriber running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    subscriber.stop().await;

    for message in subscriber.accepted() {
        println!("{}: [{}] {}", message.topic, message.message_id, message.content);
    }
    Ok(())
}

async fn run_publisher(
    topic: &str,
    content: &str,
    id: MessageId,
    priority: Priority,
    qos: QosLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = registry_addr(&config)?;

    let bind_addr = format!("{}:0", config.subscriber.host);
    let node = Node::bind(&Node::generate_name("publisher"), &bind_addr).await?;
    let publisher = node.create_publisher(registry, topic, qos, &config.publisher);

    if publisher.publish(content, id, priority).await? {
        info!(topic, id, "message delivered");
    } else {
        info!(topic, id, "message not confirmed");
    }
    Ok(())
}
