//! librdkafka-backed transport.

use std::time::Duration;
use async_trait::async_trait;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::{Header, Message, OwnedHeaders, Timestamp};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::debug;
use crate::config::{DlqConfig, ProducerConfig};
use crate::error::{ConsoleError, Result};
use crate::kafka::{
    BrokerListing, BrokerTransport, ConnectionConfig, DeliveryReceipt, OutboundMessage, PollOutcome,
    RawRecord, SampleSource,
};
use crate::metadata::NormalizedRecord;

#[derive(Debug, Clone)]
pub struct KafkaTransport {
    delivery_timeout: Duration,
    session_timeout_ms: u64,
    metadata_timeout: Duration,
}

impl KafkaTransport {
    pub fn new(producer: &ProducerConfig, dlq: &DlqConfig) -> Self {
        Self {
            delivery_timeout: Duration::from_millis(producer.delivery_timeout_ms),
            session_timeout_ms: dlq.session_timeout_ms,
            metadata_timeout: Duration::from_millis(dlq.metadata_timeout_ms),
        }
    }
}

#[async_trait]
impl BrokerTransport for KafkaTransport {
    async fn produce(&self, config: &ConnectionConfig, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        let mut conf = config.client_config();
        conf.set("message.timeout.ms", self.delivery_timeout.as_millis().to_string());
        let producer: FutureProducer = conf.create()?;

        // Optional parts stay off the wire when absent.
        let mut record = FutureRecord::<[u8], [u8]>::to(message.topic()).payload(message.value().as_bytes());
        if let Some(key) = message.key() {
            record = record.key(key.as_bytes());
        }
        if let Some(partition) = message.partition() {
            record = record.partition(partition);
        }
        if !message.headers().is_empty() {
            let headers = message.headers().iter().fold(OwnedHeaders::new(), |acc, (key, value)| {
                acc.insert(Header { key: key.as_str(), value: Some(&value[..]) })
            });
            record = record.headers(headers);
        }

        let (partition, offset) = producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
            .map_err(|(e, _)| ConsoleError::Broker(e.to_string()))?;

        Ok(DeliveryReceipt {
            topic: message.topic().to_string(),
            partition,
            offset,
        })
    }

    fn open_sample_source(&self, config: &ConnectionConfig, group_id: &str) -> Result<Box<dyn SampleSource>> {
        let mut conf = config.client_config();
        conf.set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string());
        let consumer: BaseConsumer = conf.create()?;

        Ok(Box::new(KafkaSampleSource {
            consumer: Some(consumer),
            metadata_timeout: self.metadata_timeout,
        }))
    }

    async fn list_cluster(&self, config: &ConnectionConfig) -> Result<BrokerListing> {
        let conf = config.client_config();
        let timeout = self.metadata_timeout;

        // Metadata requests block the calling thread.
        let joined = tokio::task::spawn_blocking(move || -> Result<BrokerListing> {
            let client: BaseConsumer = conf.create()?;
            let metadata = client.fetch_metadata(None, timeout)?;
            Ok(BrokerListing {
                brokers: metadata
                    .brokers()
                    .iter()
                    .map(|b| NormalizedRecord::Broker {
                        host: b.host().to_string(),
                        id: i64::from(b.id()),
                        port: u16::try_from(b.port()).unwrap_or(0),
                    })
                    .collect(),
                topics: metadata
                    .topics()
                    .iter()
                    .filter(|t| t.error().is_none())
                    .map(|t| t.name().to_string())
                    .collect(),
            })
        })
        .await;

        joined.unwrap_or_else(|e| Err(ConsoleError::Broker(format!("metadata worker failed: {}", e))))
    }
}

// ---------- Sample source ----------

pub struct KafkaSampleSource {
    consumer: Option<BaseConsumer>,
    metadata_timeout: Duration,
}

impl SampleSource for KafkaSampleSource {
    fn assign_from_earliest(&mut self, topic: &str) -> Result<Vec<i32>> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| ConsoleError::Broker("consumer already closed".to_string()))?;

        let metadata = consumer.fetch_metadata(Some(topic), self.metadata_timeout)?;
        let partitions: Vec<i32> = metadata
            .topics()
            .iter()
            .filter(|t| t.name() == topic && t.error().is_none())
            .flat_map(|t| t.partitions().iter().map(|p| p.id()))
            .collect();

        if partitions.is_empty() {
            return Ok(partitions);
        }

        let mut tpl = TopicPartitionList::new();
        for partition in &partitions {
            tpl.add_partition_offset(topic, *partition, Offset::Beginning)?;
        }
        consumer.assign(&tpl)?;
        Ok(partitions)
    }

    fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(consumer) = self.consumer.as_ref() else {
            return PollOutcome::Empty;
        };

        match consumer.poll(timeout) {
            None => PollOutcome::Empty,
            Some(Err(e)) => PollOutcome::Error(e.to_string()),
            Some(Ok(msg)) => PollOutcome::Record(RawRecord {
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(<[u8]>::to_vec),
                value: msg.payload().map(<[u8]>::to_vec),
                create_time_ms: match msg.timestamp() {
                    Timestamp::CreateTime(ts) => Some(ts),
                    _ => None,
                },
            }),
        }
    }

    fn close(&mut self) {
        // Dropping the BaseConsumer leaves the group and closes the client.
        if self.consumer.take().is_some() {
            debug!("DLQ sample consumer closed");
        }
    }
}
