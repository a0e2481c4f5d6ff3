use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use kconsole::kafka::producer::{format_json, parse_headers};
use kconsole::{
    Console, ConsoleConfig, ConsoleEvents, ConsoleHandle, ConsoleOutcome, ConnectionConfig, DataKind,
    OutboundMessage, SecurityProtocol, Ticket,
};

#[derive(Parser)]
#[command(name = "kconsole")]
#[command(about = "Kafka admin console: metadata browsing, single-message producer, DLQ sampling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FrontendArgs {
    /// Base URL of the cluster-management frontend
    #[arg(long)]
    url: String,

    #[arg(short, long)]
    user: String,

    #[arg(short, long)]
    password: String,
}

#[derive(Args, Clone)]
struct BrokerArgs {
    /// Comma separated bootstrap servers
    #[arg(short, long, default_value = "localhost:9092")]
    bootstrap: String,

    /// plaintext, tls, sasl-plain or sasl-tls
    #[arg(long, default_value = "plaintext")]
    protocol: SecurityProtocol,

    /// CA certificate for TLS (system trust store when omitted)
    #[arg(long)]
    ca: Option<PathBuf>,

    #[arg(long)]
    sasl_user: Option<String>,

    #[arg(long)]
    sasl_password: Option<String>,
}

impl BrokerArgs {
    fn connection(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(&self.bootstrap).with_protocol(self.protocol);
        if let Some(ca) = &self.ca {
            config = config.with_ca_location(ca);
        }
        if let (Some(user), Some(pass)) = (&self.sasl_user, &self.sasl_password) {
            config = config.with_sasl(user.clone(), pass.clone());
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and list the clusters the frontend knows about
    Login {
        #[command(flatten)]
        frontend: FrontendArgs,
    },

    /// Load topics, brokers or consumers
    Metadata {
        #[command(flatten)]
        frontend: FrontendArgs,

        /// topics, brokers or consumers
        kind: DataKind,
    },

    /// List DLQ topics of the cluster
    DlqTopics {
        #[command(flatten)]
        frontend: FrontendArgs,
    },

    /// Test the broker connection and list brokers, topics and DLQ topics
    Brokers {
        #[command(flatten)]
        broker: BrokerArgs,
    },

    /// Publish one message
    Send {
        #[command(flatten)]
        broker: BrokerArgs,

        topic: String,

        value: String,

        #[arg(short, long)]
        key: Option<String>,

        #[arg(long)]
        partition: Option<i32>,

        /// `key:value` pairs separated by commas
        #[arg(long)]
        headers: Option<String>,

        /// Reject and pretty-print the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read a bounded sample from the start of a DLQ topic
    DlqSample {
        #[command(flatten)]
        broker: BrokerArgs,

        topic: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ConsoleConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let (handle, mut events) = Console::start(config);

    let ok = run(cli.command, &handle, &mut events).await;
    let _ = handle.shutdown().await;

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(command: Commands, console: &ConsoleHandle, events: &mut ConsoleEvents) -> bool {
    match command {
        Commands::Login { frontend } => login(console, events, &frontend).await,

        Commands::Metadata { frontend, kind } => {
            if !login(console, events, &frontend).await {
                return false;
            }
            let ticket = console.load_metadata(kind).await;
            match wait(events, ticket).await {
                Some(ConsoleOutcome::Metadata { records, .. }) => {
                    for record in records.iter() {
                        println!("{:<40} {}", record.label(), record.summary());
                    }
                    true
                }
                other => report(other),
            }
        }

        Commands::DlqTopics { frontend } => {
            if !login(console, events, &frontend).await {
                return false;
            }
            let ticket = console.load_metadata(DataKind::Topics).await;
            if !matches!(wait(events, ticket).await, Some(ConsoleOutcome::Metadata { .. })) {
                error!("Topic listing unavailable");
                return false;
            }
            match console.dlq_topics().await {
                Ok(topics) => {
                    topics.iter().for_each(|t| println!("{}", t));
                    true
                }
                Err(e) => report(Some(ConsoleOutcome::Failed(e))),
            }
        }

        Commands::Brokers { broker } => {
            let ticket = console.test_broker_connection(broker.connection()).await;
            match wait(events, ticket).await {
                Some(ConsoleOutcome::Brokers { listing, dlq_topics }) => {
                    listing.broker_lines().iter().for_each(|line| println!("{}", line));
                    for topic in &listing.topics {
                        let tag = if dlq_topics.contains(topic) { " (dlq)" } else { "" };
                        println!("  {}{}", topic, tag);
                    }
                    info!("{} topics, {} DLQ", listing.topics.len(), dlq_topics.len());
                    true
                }
                other => report(other),
            }
        }

        Commands::Send { broker, topic, value, key, partition, headers, json } => {
            let value = if json {
                match format_json(&value) {
                    Ok(pretty) => pretty,
                    Err(e) => return report(Some(ConsoleOutcome::Failed(e))),
                }
            } else {
                value
            };

            let mut message = OutboundMessage::new(topic, value);
            if let Some(key) = key {
                message = message.with_key(key);
            }
            if let Some(partition) = partition {
                message = message.with_partition(partition);
            }
            if let Some(raw) = headers {
                message = message.with_headers(parse_headers(&raw));
            }

            let ticket = console.send_message(broker.connection(), message).await;
            match wait(events, ticket).await {
                Some(ConsoleOutcome::Sent(receipt)) => {
                    println!("{} [{}] @ {}", receipt.topic, receipt.partition, receipt.offset);
                    true
                }
                other => report(other),
            }
        }

        Commands::DlqSample { broker, topic } => {
            let ticket = console.load_dlq_sample(broker.connection(), &topic).await;
            match wait(events, ticket).await {
                Some(ConsoleOutcome::DlqSample { messages, .. }) => {
                    for m in messages.iter() {
                        println!("p{} @{} {} key={} {}", m.partition, m.offset, m.event_time, m.key, m.preview());
                    }
                    info!("{} messages", messages.len());
                    true
                }
                other => report(other),
            }
        }
    }
}

async fn login(console: &ConsoleHandle, events: &mut ConsoleEvents, frontend: &FrontendArgs) -> bool {
    let ticket = console.login(&frontend.url, &frontend.user, &frontend.password).await;
    match wait(events, ticket).await {
        Some(ConsoleOutcome::LoggedIn { cluster, clusters, .. }) => {
            info!("Logged in, cluster '{}' ({} listed)", cluster, clusters.len());
            true
        }
        other => report(other),
    }
}

async fn wait(events: &mut ConsoleEvents, ticket: Ticket) -> Option<ConsoleOutcome> {
    events.wait_for(ticket).await
}

fn report(outcome: Option<ConsoleOutcome>) -> bool {
    match outcome {
        Some(ConsoleOutcome::Failed(e)) => error!("{}", e),
        Some(other) => error!("Unexpected outcome: {:?}", other),
        None => error!("Console stopped"),
    }
    false
}
