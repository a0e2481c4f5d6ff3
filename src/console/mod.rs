//! Public façade of the console core.
//!
//! `Console::start` spawns the actor and hands back a cloneable handle plus the
//! events receiver. Every request returns a `Ticket` right away; its outcome
//! arrives later as a `ConsoleEvent` with the same ticket.

pub mod actor;
pub mod commands;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::warn;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::kafka::{
    BrokerTransport, ClusterInspector, ConnectionConfig, ConsumedMessage, DlqConsumer, KafkaTransport,
    MessageProducer, OutboundMessage, SendRecord,
};
use crate::metadata::{DataKind, FetchOptions, MetadataCache, PaginatedFetcher};

pub use actor::ConsoleActor;
use actor::BrokerWorkers;
pub use commands::{ConsoleCommand, ConsoleEvent, ConsoleOutcome, Ticket};

pub struct Console;

impl Console {
    /// Starts a console talking to the broker through librdkafka.
    /// Must be called inside a tokio runtime.
    pub fn start(config: ConsoleConfig) -> (ConsoleHandle, ConsoleEvents) {
        let transport = Arc::new(KafkaTransport::new(&config.producer, &config.dlq));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ConsoleConfig, transport: Arc<dyn BrokerTransport>) -> (ConsoleHandle, ConsoleEvents) {
        let (tx, rx) = mpsc::channel(config.command_channel_capacity.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let cache = Arc::new(MetadataCache::new(config.metadata.cache_ttl_ms));
        let fetcher = PaginatedFetcher::new(cache, FetchOptions::from_config(&config.metadata));
        let brokers = BrokerWorkers {
            producer: MessageProducer::new(transport.clone()),
            dlq: DlqConsumer::new(transport.clone()),
            inspector: ClusterInspector::new(transport),
        };
        let actor = ConsoleActor::new(config, fetcher, brokers, rx, events_tx.clone());
        tokio::spawn(actor.run());

        let handle = ConsoleHandle {
            tx,
            events: events_tx,
            next_ticket: Arc::new(AtomicU64::new(1)),
        };
        (handle, ConsoleEvents { rx: events_rx })
    }
}

// ==========================================
// HANDLE
// ==========================================

#[derive(Clone)]
pub struct ConsoleHandle {
    tx: mpsc::Sender<ConsoleCommand>,
    events: mpsc::UnboundedSender<ConsoleEvent>,
    next_ticket: Arc<AtomicU64>,
}

impl ConsoleHandle {
    fn ticket(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    /// Hands a ticketed command to the actor; when it is gone the ticket
    /// resolves to `Shutdown`.
    async fn submit(&self, ticket: Ticket, cmd: ConsoleCommand) -> Ticket {
        if self.tx.send(cmd).await.is_err() {
            warn!("Console stopped, request {} rejected", ticket);
            let _ = self.events.send(ConsoleEvent {
                ticket,
                outcome: ConsoleOutcome::Failed(ConsoleError::Shutdown),
            });
        }
        ticket
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ConsoleCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| ConsoleError::Shutdown)?;
        rx.await.map_err(|_| ConsoleError::Shutdown)
    }

    pub async fn login(&self, base_url: &str, username: &str, password: &str) -> Ticket {
        let ticket = self.ticket();
        let cmd = ConsoleCommand::Login {
            ticket,
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };
        self.submit(ticket, cmd).await
    }

    pub async fn logout(&self) -> Ticket {
        let ticket = self.ticket();
        self.submit(ticket, ConsoleCommand::Logout { ticket }).await
    }

    pub async fn load_metadata(&self, kind: DataKind) -> Ticket {
        let ticket = self.ticket();
        self.submit(ticket, ConsoleCommand::LoadMetadata { ticket, kind }).await
    }

    pub async fn cancel_metadata_load(&self) {
        let _ = self.tx.send(ConsoleCommand::CancelMetadataLoad).await;
    }

    pub async fn send_message(&self, config: ConnectionConfig, message: OutboundMessage) -> Ticket {
        let ticket = self.ticket();
        self.submit(ticket, ConsoleCommand::SendMessage { ticket, config, message }).await
    }

    pub async fn load_dlq_sample(&self, config: ConnectionConfig, topic: &str) -> Ticket {
        let ticket = self.ticket();
        let cmd = ConsoleCommand::LoadDlqSample {
            ticket,
            config,
            topic: topic.to_string(),
        };
        self.submit(ticket, cmd).await
    }

    pub async fn cancel_dlq_sample(&self) {
        let _ = self.tx.send(ConsoleCommand::CancelDlqSample).await;
    }

    /// Lists brokers and topics straight from the bootstrap servers. The
    /// outcome also carries the DLQ topics among them.
    pub async fn test_broker_connection(&self, config: ConnectionConfig) -> Ticket {
        let ticket = self.ticket();
        self.submit(ticket, ConsoleCommand::TestBrokerConnection { ticket, config }).await
    }

    /// DLQ topic names derived from the cached topic listing.
    pub async fn dlq_topics(&self) -> Result<Vec<String>> {
        self.query(|reply| ConsoleCommand::DlqTopics { reply }).await
    }

    /// Messages of the last completed DLQ sample.
    pub async fn dlq_messages(&self) -> Result<Arc<Vec<ConsumedMessage>>> {
        self.query(|reply| ConsoleCommand::DlqMessages { reply }).await
    }

    /// Full sampled message at `partition`/`offset`, for re-publishing.
    /// `None` when the working set holds no such message.
    pub async fn replay_message(&self, partition: i32, offset: i64) -> Result<Option<ConsumedMessage>> {
        self.query(|reply| ConsoleCommand::ReplayMessage { partition, offset, reply }).await
    }

    pub async fn history(&self) -> Result<Vec<SendRecord>> {
        self.query(|reply| ConsoleCommand::History { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.query(|reply| ConsoleCommand::Shutdown { reply }).await
    }
}

// ==========================================
// EVENTS
// ==========================================

pub struct ConsoleEvents {
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
}

impl ConsoleEvents {
    /// `None` once the console has stopped and every handle is gone.
    pub async fn recv(&mut self) -> Option<ConsoleEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for callers driving their own loop.
    pub fn try_recv(&mut self) -> Option<ConsoleEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits for the outcome of `ticket`, dropping unrelated events.
    pub async fn wait_for(&mut self, ticket: Ticket) -> Option<ConsoleOutcome> {
        while let Some(event) = self.rx.recv().await {
            if event.ticket == ticket {
                return Some(event.outcome);
            }
        }
        None
    }
}
