//! Broker-facing side of the console: connection settings, single-message
//! producer, DLQ sampling, cluster listing and the rdkafka transport behind them.

use std::time::Duration;
use async_trait::async_trait;

pub mod connection;
pub mod producer;
pub mod dlq_consumer;
pub mod transport;
pub mod admin;

pub use connection::{ConnectionConfig, SecurityProtocol};
pub use producer::{DeliveryReceipt, MessageProducer, OutboundMessage, Payload, SendRecord};
pub use dlq_consumer::{find_message, ConsumedMessage, DlqConsumer, SampleOptions, SampleState};
pub use transport::KafkaTransport;
pub use admin::{BrokerListing, ClusterInspector};

use crate::error::Result;

// ==========================================
// TRANSPORT SEAM
// ==========================================

/// One record as handed over by the broker client, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    /// Producer-assigned creation time (epoch ms), if any.
    pub create_time_ms: Option<i64>,
}

/// Outcome of one poll of a sample source.
#[derive(Debug)]
pub enum PollOutcome {
    Record(RawRecord),
    /// Nothing arrived within the poll interval.
    Empty,
    /// Per-message broker error; the sample skips it.
    Error(String),
}

/// Blocking consumer handle used by one DLQ sample call.
pub trait SampleSource: Send {
    /// Assigns every partition of `topic` at its earliest offset and returns
    /// the partition ids. Empty when the topic is unknown.
    fn assign_from_earliest(&mut self, topic: &str) -> Result<Vec<i32>>;

    fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// Releases the underlying client. Must be idempotent.
    fn close(&mut self);
}

/// Everything the console needs from the broker wire protocol.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn produce(&self, config: &ConnectionConfig, message: &OutboundMessage) -> Result<DeliveryReceipt>;

    /// Opens a consumer under a throwaway group id that never commits offsets.
    fn open_sample_source(&self, config: &ConnectionConfig, group_id: &str) -> Result<Box<dyn SampleSource>>;

    /// Brokers and topic names from the cluster metadata.
    async fn list_cluster(&self, config: &ConnectionConfig) -> Result<BrokerListing>;
}
