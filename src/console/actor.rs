//! Console Actor: owns the session, the in-flight table and the cancellation
//! tokens. Long operations run on worker tasks and report back through
//! `WorkerDone`; outcomes go out on the events channel.
//!
//! The events channel is unbounded and the actor never awaits a send, so a
//! caller that stops draining events cannot stall commands or queries.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::auth::AuthSession;
use crate::config::{ConsoleConfig, HttpConfig};
use crate::console::commands::{ConsoleCommand, ConsoleEvent, ConsoleOutcome, Ticket, WorkerDone};
use crate::error::{ConsoleError, Result};
use crate::kafka::producer::SendHistory;
use crate::kafka::{
    find_message, ClusterInspector, ConnectionConfig, ConsumedMessage, DlqConsumer, MessageProducer,
    OutboundMessage, SampleOptions, SendRecord,
};
use crate::metadata::{dlq_topics, DataKind, PaginatedFetcher};

/// A metadata fetch in progress and every ticket waiting on it.
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    waiters: Vec<Ticket>,
}

struct DlqJob {
    generation: u64,
    cancel: CancellationToken,
}

/// Broker-side workers, all sharing one transport.
pub(crate) struct BrokerWorkers {
    pub producer: MessageProducer,
    pub dlq: DlqConsumer,
    pub inspector: ClusterInspector,
}

pub struct ConsoleActor {
    config: ConsoleConfig,
    session: Option<Arc<AuthSession>>,
    fetcher: PaginatedFetcher,
    brokers: BrokerWorkers,
    history: Arc<SendHistory>,

    in_flight: HashMap<DataKind, InFlight>,
    dlq_job: Option<DlqJob>,
    dlq_messages: Arc<Vec<ConsumedMessage>>,
    /// Generation of the login whose result may still install a session.
    login_generation: Option<u64>,
    generation: u64,

    rx: mpsc::Receiver<ConsoleCommand>,
    done_tx: mpsc::UnboundedSender<WorkerDone>,
    done_rx: mpsc::UnboundedReceiver<WorkerDone>,
    events: mpsc::UnboundedSender<ConsoleEvent>,
}

impl ConsoleActor {
    pub(crate) fn new(
        config: ConsoleConfig,
        fetcher: PaginatedFetcher,
        brokers: BrokerWorkers,
        rx: mpsc::Receiver<ConsoleCommand>,
        events: mpsc::UnboundedSender<ConsoleEvent>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let history = Arc::new(SendHistory::new(config.producer.history_limit));
        Self {
            config,
            session: None,
            fetcher,
            brokers,
            history,
            in_flight: HashMap::new(),
            dlq_job: None,
            dlq_messages: Arc::new(Vec::new()),
            login_generation: None,
            generation: 0,
            rx,
            done_tx,
            done_rx,
            events,
        }
    }

    pub async fn run(mut self) {
        info!("Console actor started");
        loop {
            tokio::select! {
                maybe_cmd = self.rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            if !self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break, // Every handle dropped
                    }
                }
                Some(done) = self.done_rx.recv() => {
                    self.handle_done(done);
                }
            }
        }
        self.cancel_everything();
        info!("Console actor stopped");
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn emit(&self, ticket: Ticket, outcome: ConsoleOutcome) {
        if let ConsoleOutcome::Failed(e) = &outcome {
            debug!("Request {} failed: {}", ticket, e);
        }
        if self.events.send(ConsoleEvent { ticket, outcome }).is_err() {
            warn!("Event receiver dropped, outcome of {} lost", ticket);
        }
    }

    fn cancel_everything(&mut self) {
        for (_, job) in self.in_flight.drain() {
            job.cancel.cancel();
        }
        if let Some(job) = self.dlq_job.take() {
            job.cancel.cancel();
        }
        self.login_generation = None;
    }

    // ---------- Commands ----------

    fn handle_command(&mut self, cmd: ConsoleCommand) -> bool {
        match cmd {
            ConsoleCommand::Login { ticket, base_url, username, password } => {
                self.start_login(ticket, base_url, username, password);
            }
            ConsoleCommand::Logout { ticket } => {
                self.drop_session();
                self.emit(ticket, ConsoleOutcome::LoggedOut);
            }
            ConsoleCommand::LoadMetadata { ticket, kind } => {
                self.load_metadata(ticket, kind);
            }
            ConsoleCommand::CancelMetadataLoad => {
                self.cancel_metadata();
            }
            ConsoleCommand::SendMessage { ticket, config, message } => {
                self.send_message(ticket, config, message);
            }
            ConsoleCommand::LoadDlqSample { ticket, config, topic } => {
                self.start_dlq_sample(ticket, config, topic);
            }
            ConsoleCommand::CancelDlqSample => {
                if let Some(job) = &self.dlq_job {
                    info!("Cancelling DLQ sample");
                    job.cancel.cancel();
                }
            }
            ConsoleCommand::TestBrokerConnection { ticket, config } => {
                self.test_broker_connection(ticket, config);
            }
            ConsoleCommand::DlqTopics { reply } => {
                let _ = reply.send(self.dlq_topics());
            }
            ConsoleCommand::DlqMessages { reply } => {
                let _ = reply.send(self.dlq_messages.clone());
            }
            ConsoleCommand::ReplayMessage { partition, offset, reply } => {
                let found = find_message(&self.dlq_messages, partition, offset).cloned();
                if found.is_none() {
                    debug!("No sampled message at partition {} offset {}", partition, offset);
                }
                let _ = reply.send(found);
            }
            ConsoleCommand::History { reply } => {
                let _ = reply.send(self.history.snapshot());
            }
            ConsoleCommand::Shutdown { reply } => {
                self.cancel_everything();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn start_login(&mut self, ticket: Ticket, base_url: String, username: String, password: String) {
        let generation = self.next_generation();
        self.login_generation = Some(generation);

        let http = self.config.http.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = login_and_resolve(&base_url, &username, &password, &http).await;
            let _ = done.send(WorkerDone::Login { ticket, generation, result });
        });
    }

    /// Forgets the session, any login still in flight and everything fetched
    /// under the session.
    fn drop_session(&mut self) {
        self.login_generation = None;
        self.cancel_metadata();
        self.fetcher.cache().clear();
        if let Some(session) = self.session.take() {
            release(session);
        }
    }

    fn load_metadata(&mut self, ticket: Ticket, kind: DataKind) {
        let Some(session) = self.session.clone() else {
            self.emit(ticket, ConsoleOutcome::Failed(ConsoleError::NotAuthenticated));
            return;
        };

        if let Some(entry) = self.fetcher.cache().get_fresh(kind) {
            debug!("Serving {} from cache", kind);
            self.emit(ticket, ConsoleOutcome::metadata(&entry, true));
            return;
        }

        if let Some(job) = self.in_flight.get_mut(&kind) {
            debug!("Request {} joins the {} fetch in flight", ticket, kind);
            job.waiters.push(ticket);
            return;
        }

        let generation = self.next_generation();
        let cancel = CancellationToken::new();
        self.in_flight.insert(kind, InFlight { generation, cancel: cancel.clone(), waiters: vec![ticket] });

        let fetcher = self.fetcher.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(session, kind, &cancel).await;
            let _ = done.send(WorkerDone::Metadata { kind, generation, result });
        });
    }

    fn cancel_metadata(&mut self) {
        let jobs: Vec<(DataKind, InFlight)> = self.in_flight.drain().collect();
        for (kind, job) in jobs {
            info!("Cancelling {} fetch", kind);
            job.cancel.cancel();
            for ticket in job.waiters {
                self.emit(ticket, ConsoleOutcome::MetadataCancelled { kind });
            }
        }
    }

    fn send_message(&mut self, ticket: Ticket, config: ConnectionConfig, message: OutboundMessage) {
        if let Err(e) = config.validate() {
            self.emit(ticket, ConsoleOutcome::Failed(e));
            return;
        }

        let producer = self.brokers.producer.clone();
        let history = self.history.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = producer.send(&config, &message).await;
            if result.is_ok() {
                history.push(SendRecord::from_message(&message));
            }
            let _ = events.send(ConsoleEvent { ticket, outcome: result.into() });
        });
    }

    fn test_broker_connection(&mut self, ticket: Ticket, config: ConnectionConfig) {
        let inspector = self.brokers.inspector.clone();
        let marker = self.config.metadata.dlq_marker.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = match inspector.list(&config).await {
                Ok(listing) => ConsoleOutcome::Brokers {
                    dlq_topics: listing.dlq_topics(&marker),
                    listing,
                },
                Err(e) => ConsoleOutcome::Failed(e),
            };
            let _ = events.send(ConsoleEvent { ticket, outcome });
        });
    }

    fn start_dlq_sample(&mut self, ticket: Ticket, config: ConnectionConfig, topic: String) {
        if let Some(previous) = self.dlq_job.take() {
            debug!("New DLQ sample supersedes the running one");
            previous.cancel.cancel();
        }
        self.dlq_messages = Arc::new(Vec::new());

        if let Err(e) = config.validate() {
            self.emit(ticket, ConsoleOutcome::Failed(e));
            return;
        }

        let generation = self.next_generation();
        let cancel = CancellationToken::new();
        self.dlq_job = Some(DlqJob { generation, cancel: cancel.clone() });

        let dlq = self.brokers.dlq.clone();
        let options = SampleOptions::from_config(&self.config.dlq);
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let sample_topic = topic.clone();
            // The broker consumer blocks on poll.
            let joined = tokio::task::spawn_blocking(move || dlq.sample(&config, &sample_topic, &options, &cancel)).await;
            let result = joined.unwrap_or_else(|e| Err(ConsoleError::Broker(format!("DLQ sample worker failed: {}", e))));
            let _ = done.send(WorkerDone::DlqSample { ticket, generation, topic, result });
        });
    }

    fn dlq_topics(&self) -> Vec<String> {
        self.fetcher
            .cache()
            .get(DataKind::Topics)
            .map(|entry| dlq_topics(&entry.records, &self.config.metadata.dlq_marker))
            .unwrap_or_default()
    }

    // ---------- Worker completions ----------

    fn handle_done(&mut self, done: WorkerDone) {
        match done {
            WorkerDone::Login { ticket, generation, result } => {
                if self.login_generation != Some(generation) {
                    debug!("Dropping result of superseded login {}", ticket);
                    if let Ok((session, _)) = result {
                        session.logout();
                    }
                    self.emit(ticket, ConsoleOutcome::LoginCancelled);
                    return;
                }
                self.login_generation = None;

                match result {
                    Ok((session, clusters)) => {
                        self.drop_session();
                        let outcome = ConsoleOutcome::LoggedIn {
                            base_url: session.base_url().to_string(),
                            cluster: session.cluster(),
                            clusters,
                        };
                        self.session = Some(Arc::new(session));
                        self.emit(ticket, outcome);
                    }
                    Err(e) => {
                        error!("Login failed: {}", e);
                        self.emit(ticket, ConsoleOutcome::Failed(e));
                    }
                }
            }

            WorkerDone::Metadata { kind, generation, result } => {
                let current = self.in_flight.get(&kind).is_some_and(|job| job.generation == generation);
                if !current {
                    debug!("Dropping superseded {} fetch result", kind);
                    return;
                }
                let Some(job) = self.in_flight.remove(&kind) else {
                    return;
                };

                let outcome = match result {
                    Ok(Some(entry)) => ConsoleOutcome::metadata(&entry, false),
                    Ok(None) => ConsoleOutcome::MetadataCancelled { kind },
                    Err(e) => {
                        error!("Loading {} failed: {}", kind, e);
                        ConsoleOutcome::Failed(e)
                    }
                };
                for ticket in job.waiters {
                    self.emit(ticket, outcome.clone());
                }
            }

            WorkerDone::DlqSample { ticket, generation, topic, result } => {
                let current = self.dlq_job.as_ref().is_some_and(|job| job.generation == generation);
                let outcome = match result {
                    Ok(messages) => {
                        let messages = Arc::new(messages);
                        if current {
                            self.dlq_messages = messages.clone();
                        }
                        ConsoleOutcome::DlqSample { topic, messages }
                    }
                    Err(e) => {
                        error!("DLQ sample of '{}' failed: {}", topic, e);
                        ConsoleOutcome::Failed(e)
                    }
                };
                if current {
                    self.dlq_job = None;
                }
                self.emit(ticket, outcome);
            }
        }
    }
}

fn release(session: Arc<AuthSession>) {
    match Arc::try_unwrap(session) {
        Ok(session) => session.logout(),
        Err(_) => info!("Session released"),
    }
}

async fn login_and_resolve(
    base_url: &str,
    username: &str,
    password: &str,
    http: &HttpConfig,
) -> Result<(AuthSession, Vec<String>)> {
    let session = AuthSession::login(base_url, username, password, http).await?;
    let clusters = match session.resolve_cluster().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Cluster listing unavailable, using '{}': {}", session.cluster(), e);
            Vec::new()
        }
    };
    Ok((session, clusters))
}
