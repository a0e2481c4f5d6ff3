use std::fmt;
use std::sync::Arc;
use serde::Serialize;
use tokio::sync::oneshot;
use crate::auth::AuthSession;
use crate::error::{ConsoleError, Result};
use crate::kafka::{BrokerListing, ConnectionConfig, ConsumedMessage, DeliveryReceipt, OutboundMessage, SendRecord};
use crate::metadata::{CacheEntry, DataKind, NormalizedRecord};

// ==========================================
// TICKETS & EVENTS
// ==========================================

/// Identifies one request; its outcome arrives as an event carrying the same ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ConsoleOutcome {
    LoggedIn {
        base_url: String,
        cluster: String,
        clusters: Vec<String>,
    },
    /// A logout or a newer login arrived while this login was in flight.
    LoginCancelled,
    LoggedOut,
    Metadata {
        kind: DataKind,
        records: Arc<Vec<NormalizedRecord>>,
        fetched_at_ms: u64,
        from_cache: bool,
    },
    MetadataCancelled {
        kind: DataKind,
    },
    Sent(DeliveryReceipt),
    Brokers {
        listing: BrokerListing,
        dlq_topics: Vec<String>,
    },
    DlqSample {
        topic: String,
        messages: Arc<Vec<ConsumedMessage>>,
    },
    Failed(ConsoleError),
}

impl ConsoleOutcome {
    pub(crate) fn metadata(entry: &CacheEntry, from_cache: bool) -> Self {
        ConsoleOutcome::Metadata {
            kind: entry.kind,
            records: entry.records.clone(),
            fetched_at_ms: entry.fetched_at_ms,
            from_cache,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ConsoleOutcome::Failed(_))
    }
}

impl<T> From<Result<T>> for ConsoleOutcome
where
    T: Into<ConsoleOutcome>,
{
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => v.into(),
            Err(e) => ConsoleOutcome::Failed(e),
        }
    }
}

impl From<DeliveryReceipt> for ConsoleOutcome {
    fn from(receipt: DeliveryReceipt) -> Self {
        ConsoleOutcome::Sent(receipt)
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleEvent {
    pub ticket: Ticket,
    pub outcome: ConsoleOutcome,
}

// ==========================================
// ACTOR COMMANDS
// ==========================================

pub enum ConsoleCommand {
    Login {
        ticket: Ticket,
        base_url: String,
        username: String,
        password: String,
    },
    Logout {
        ticket: Ticket,
    },
    LoadMetadata {
        ticket: Ticket,
        kind: DataKind,
    },
    CancelMetadataLoad,
    SendMessage {
        ticket: Ticket,
        config: ConnectionConfig,
        message: OutboundMessage,
    },
    LoadDlqSample {
        ticket: Ticket,
        config: ConnectionConfig,
        topic: String,
    },
    CancelDlqSample,
    TestBrokerConnection {
        ticket: Ticket,
        config: ConnectionConfig,
    },

    // Queries
    DlqTopics {
        reply: oneshot::Sender<Vec<String>>,
    },
    DlqMessages {
        reply: oneshot::Sender<Arc<Vec<ConsumedMessage>>>,
    },
    ReplayMessage {
        partition: i32,
        offset: i64,
        reply: oneshot::Sender<Option<ConsumedMessage>>,
    },
    History {
        reply: oneshot::Sender<Vec<SendRecord>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Completions reported back to the actor by its workers.
pub(crate) enum WorkerDone {
    Login {
        ticket: Ticket,
        generation: u64,
        result: Result<(AuthSession, Vec<String>)>,
    },
    Metadata {
        kind: DataKind,
        generation: u64,
        result: Result<Option<CacheEntry>>,
    },
    DlqSample {
        ticket: Ticket,
        generation: u64,
        topic: String,
        result: Result<Vec<ConsumedMessage>>,
    },
}
