//! Single-message producer plus the small helpers the send form relies on
//! (header parsing, JSON checks, send history).

use std::collections::VecDeque;
use std::sync::Arc;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};
use crate::error::{ConsoleError, Result};
use crate::kafka::{BrokerTransport, ConnectionConfig};
use crate::utils::utils_time::clock_label;

const HISTORY_PREVIEW_CHARS: usize = 50;

// ---------- Payload ----------

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Raw(Bytes),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Raw(b) => b.as_ref(),
        }
    }

    /// Lossy text view, used for history and logs only.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Raw(Bytes::from(v))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Raw(b)
    }
}

// ---------- OutboundMessage ----------

/// A message to publish. Built up front, then handed over by value: nothing
/// can change it once it is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    topic: String,
    partition: Option<i32>,
    key: Option<Payload>,
    value: Payload,
    headers: Vec<(String, Bytes)>,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, value: impl Into<Payload>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: None,
            value: value.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_key(mut self, key: impl Into<Payload>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, Bytes)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> Option<i32> {
        self.partition
    }

    pub fn key(&self) -> Option<&Payload> {
        self.key.as_ref()
    }

    pub fn value(&self) -> &Payload {
        &self.value
    }

    pub fn headers(&self) -> &[(String, Bytes)] {
        &self.headers
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

// ---------- MessageProducer ----------

#[derive(Clone)]
pub struct MessageProducer {
    transport: Arc<dyn BrokerTransport>,
}

impl MessageProducer {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        Self { transport }
    }

    /// Publishes one message and waits for the broker acknowledgement.
    /// Credential problems are reported before any connection is attempted.
    pub async fn send(&self, config: &ConnectionConfig, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        config.validate()?;
        if message.topic().trim().is_empty() {
            return Err(ConsoleError::Configuration("target topic is required".to_string()));
        }

        match self.transport.produce(config, message).await {
            Ok(receipt) => {
                info!(
                    "Delivered to {} [{}] @ {}",
                    receipt.topic, receipt.partition, receipt.offset
                );
                Ok(receipt)
            }
            Err(e) => {
                error!("Delivery to '{}' failed: {}", message.topic(), e);
                Err(e)
            }
        }
    }
}

// ---------- Helpers ----------

/// Parses `key:value` pairs separated by commas. Entries without a colon are
/// dropped; keys and values are trimmed.
pub fn parse_headers(raw: &str) -> Vec<(String, Bytes)> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), Bytes::from(value.trim().to_string())))
        })
        .collect()
}

pub fn validate_json(text: &str) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|_| ())
        .map_err(|e| ConsoleError::Configuration(format!("Invalid JSON: {}", e)))
}

/// Pretty-prints a JSON document with two-space indentation.
pub fn format_json(text: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ConsoleError::Configuration(format!("Invalid JSON: {}", e)))?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| ConsoleError::Configuration(e.to_string()))
}

// ---------- Send history ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendRecord {
    pub time: String,
    pub topic: String,
    pub key: String,
    pub message: String,
}

impl SendRecord {
    pub fn from_message(message: &OutboundMessage) -> Self {
        Self {
            time: clock_label(),
            topic: message.topic().to_string(),
            key: message.key().map(Payload::to_text).unwrap_or_default(),
            message: truncate_chars(&message.value().to_text(), HISTORY_PREVIEW_CHARS),
        }
    }
}

/// Bounded log of successful sends, oldest evicted first.
pub struct SendHistory {
    limit: usize,
    entries: Mutex<VecDeque<SendRecord>>,
}

impl SendHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn push(&self, record: SendRecord) {
        let mut entries = self.entries.lock();
        entries.push_back(record);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<SendRecord> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_split_and_trimmed() {
        let headers = parse_headers("trace-id: abc , retry:3,broken, :novalue, x:a:b");
        assert_eq!(
            headers,
            vec![
                ("trace-id".to_string(), Bytes::from("abc")),
                ("retry".to_string(), Bytes::from("3")),
                ("x".to_string(), Bytes::from("a:b")),
            ]
        );
        assert!(parse_headers("").is_empty());
    }

    #[test]
    fn json_helpers() {
        assert!(validate_json(r#"{"a":1}"#).is_ok());
        assert!(validate_json("{oops").unwrap_err().is_configuration());
        assert_eq!(format_json(r#"{"a":1}"#).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn builder_keeps_optional_parts_absent() {
        let msg = OutboundMessage::new("orders", "{}");
        assert_eq!(msg.partition(), None);
        assert!(msg.key().is_none());
        assert!(msg.headers().is_empty());

        let msg = msg.with_partition(2).with_key("k1").with_header("h", "v");
        assert_eq!(msg.partition(), Some(2));
        assert_eq!(msg.key().map(Payload::as_bytes), Some(&b"k1"[..]));
        assert_eq!(msg.headers().len(), 1);
    }

    #[test]
    fn history_is_bounded_and_previews_messages() {
        let history = SendHistory::new(2);
        for i in 0..3 {
            let msg = OutboundMessage::new(format!("t{}", i), "x".repeat(80)).with_key("k");
            history.push(SendRecord::from_message(&msg));
        }
        let entries = history.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].topic, "t1");
        assert_eq!(entries[1].message, format!("{}...", "x".repeat(50)));
        assert_eq!(entries[1].key, "k");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("привет", 3), "при...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
