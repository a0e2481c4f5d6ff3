//! DLQ sampling: reads a bounded number of messages from the start of a topic.
//!
//! State machine: Subscribing -> AwaitingAssignment -> Polling -> Terminal.
//! The consumer uses a fresh group id per call and never commits, so it does
//! not disturb any real consumer group. Polling stops on whichever comes first:
//! `max_messages` collected, no new message for `idle_timeout`, cancellation.

use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::DlqConfig;
use crate::error::{ConsoleError, Result};
use crate::kafka::producer::truncate_chars;
use crate::kafka::{BrokerTransport, ConnectionConfig, OutboundMessage, PollOutcome, RawRecord, SampleSource};
use crate::utils::utils_time::{format_epoch_ms, UNKNOWN_TIME};

pub const NO_PARTITIONS_ASSIGNED: &str = "no partitions assigned — verify topic exists";
const PREVIEW_CHARS: usize = 100;

// ==========================================
// OPTIONS & MESSAGE
// ==========================================

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub max_messages: usize,
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound of raw bytes rendered in a binary fallback.
    pub fallback_bytes: usize,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self::from_config(&DlqConfig::default())
    }
}

impl SampleOptions {
    pub fn from_config(cfg: &DlqConfig) -> Self {
        Self {
            max_messages: cfg.max_messages,
            idle_timeout: Duration::from_millis(cfg.idle_timeout_ms),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            fallback_bytes: cfg.fallback_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleState {
    Subscribing,
    AwaitingAssignment,
    Polling,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumedMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    /// Full decoded value; display layers derive previews from it.
    pub value: String,
    pub event_time: String,
}

impl ConsumedMessage {
    pub fn from_raw(raw: RawRecord, fallback_bytes: usize) -> Self {
        Self {
            partition: raw.partition,
            offset: raw.offset,
            key: decode_text(raw.key.as_deref(), fallback_bytes),
            value: decode_text(raw.value.as_deref(), fallback_bytes),
            event_time: raw
                .create_time_ms
                .map(format_epoch_ms)
                .unwrap_or_else(|| UNKNOWN_TIME.to_string()),
        }
    }

    pub fn preview(&self) -> String {
        truncate_chars(&self.value, PREVIEW_CHARS)
    }

    /// Draft re-publishing this message to `topic` with its full value. The
    /// key is carried over when present.
    pub fn to_outbound(&self, topic: impl Into<String>) -> OutboundMessage {
        let message = OutboundMessage::new(topic, self.value.clone());
        if self.key.is_empty() {
            message
        } else {
            message.with_key(self.key.clone())
        }
    }

    /// Parse error when the value is not a JSON document.
    pub fn json_error(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.value)
            .err()
            .map(|e| format!("Invalid JSON: {}", e))
    }
}

/// Looks a message up by its position in the topic.
pub fn find_message(messages: &[ConsumedMessage], partition: i32, offset: i64) -> Option<&ConsumedMessage> {
    messages.iter().find(|m| m.partition == partition && m.offset == offset)
}

/// UTF-8 text when possible, otherwise a bounded `<binary N bytes> 0x..` marker.
pub fn decode_text(bytes: Option<&[u8]>, fallback_bytes: usize) -> String {
    let Some(bytes) = bytes else {
        return String::new();
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let shown = &bytes[..bytes.len().min(fallback_bytes)];
            let ellipsis = if shown.len() < bytes.len() { "…" } else { "" };
            format!("<binary {} bytes> 0x{}{}", bytes.len(), hex::encode(shown), ellipsis)
        }
    }
}

// ==========================================
// CONSUMER
// ==========================================

/// Closes the source on every exit path, including unwinding.
struct SourceGuard(Box<dyn SampleSource>);

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[derive(Clone)]
pub struct DlqConsumer {
    transport: Arc<dyn BrokerTransport>,
}

impl DlqConsumer {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        Self { transport }
    }

    pub fn group_id(topic: &str) -> String {
        format!("dlq-viewer-{}-{}", topic, Uuid::new_v4())
    }

    /// Blocking: run it on a blocking worker (`spawn_blocking`).
    pub fn sample(
        &self,
        config: &ConnectionConfig,
        topic: &str,
        options: &SampleOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConsumedMessage>> {
        config.validate()?;
        if topic.trim().is_empty() {
            return Err(ConsoleError::Configuration("select a DLQ topic first".to_string()));
        }

        let group_id = Self::group_id(topic);
        debug!(topic = %topic, group = %group_id, state = ?SampleState::Subscribing, "DLQ sample starting");
        let mut guard = SourceGuard(self.transport.open_sample_source(config, &group_id)?);

        let messages = run_sample(guard.0.as_mut(), topic, options, cancel)?;
        info!("DLQ sample of '{}' collected {} messages", topic, messages.len());
        Ok(messages)
    }
}

fn run_sample(
    source: &mut dyn SampleSource,
    topic: &str,
    options: &SampleOptions,
    cancel: &CancellationToken,
) -> Result<Vec<ConsumedMessage>> {
    debug!(topic = %topic, state = ?SampleState::AwaitingAssignment, "Waiting for partition assignment");
    let partitions = source.assign_from_earliest(topic)?;
    if partitions.is_empty() {
        return Err(ConsoleError::Broker(NO_PARTITIONS_ASSIGNED.to_string()));
    }

    debug!(topic = %topic, partitions = ?partitions, state = ?SampleState::Polling, "Partitions assigned");
    let mut messages = Vec::with_capacity(options.max_messages.min(1024));
    let mut last_message_at = Instant::now();

    while messages.len() < options.max_messages {
        if cancel.is_cancelled() {
            debug!("DLQ sample of '{}' cancelled after {} messages", topic, messages.len());
            break;
        }

        match source.poll(options.poll_interval) {
            PollOutcome::Record(raw) => {
                messages.push(ConsumedMessage::from_raw(raw, options.fallback_bytes));
                last_message_at = Instant::now();
                continue;
            }
            PollOutcome::Empty => {}
            PollOutcome::Error(e) => warn!("Skipping broken record on '{}': {}", topic, e),
        }

        // Idle DLQ is taken as exhausted; a slow backlog may get cut short.
        if last_message_at.elapsed() >= options.idle_timeout {
            debug!("DLQ sample of '{}' idle for {:?}, stopping", topic, options.idle_timeout);
            break;
        }
    }

    debug!(topic = %topic, state = ?SampleState::Terminal, "DLQ sample finished");
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: &[u8]) -> RawRecord {
        RawRecord {
            partition: 0,
            offset: 7,
            key: None,
            value: Some(value.to_vec()),
            create_time_ms: None,
        }
    }

    #[test]
    fn valid_utf8_is_kept_whole() {
        let long = "é".repeat(500);
        let msg = ConsumedMessage::from_raw(raw(long.as_bytes()), 32);
        assert_eq!(msg.value, long);
        assert_eq!(msg.key, "");
        assert_eq!(msg.event_time, UNKNOWN_TIME);
        assert_eq!(msg.preview(), format!("{}...", "é".repeat(100)));
    }

    #[test]
    fn binary_fallback_is_bounded() {
        let bytes: Vec<u8> = std::iter::repeat(0xffu8).take(100).collect();
        let text = decode_text(Some(&bytes), 4);
        assert_eq!(text, "<binary 100 bytes> 0xffffffff…");

        let short = decode_text(Some(&[0xc3, 0x28]), 32);
        assert_eq!(short, "<binary 2 bytes> 0xc328");
    }

    #[test]
    fn replay_draft_keeps_the_full_value_and_key() {
        let body = format!("{{\"payload\":\"{}\"}}", "x".repeat(300));
        let mut r = raw(body.as_bytes());
        r.key = Some(b"order-7".to_vec());
        let msg = ConsumedMessage::from_raw(r, 32);

        let outbound = msg.to_outbound("orders");
        assert_eq!(outbound.topic(), "orders");
        assert_eq!(outbound.value().to_text(), body);
        assert_eq!(outbound.key().map(|k| k.to_text()), Some("order-7".to_string()));
        assert!(msg.json_error().is_none());
    }

    #[test]
    fn non_json_values_report_the_parse_error() {
        let msg = ConsumedMessage::from_raw(raw(b"not json"), 32);
        assert!(msg.json_error().unwrap().starts_with("Invalid JSON: "));
        assert!(msg.to_outbound("orders").key().is_none());
    }

    #[test]
    fn create_time_is_formatted() {
        let mut r = raw(b"v");
        r.create_time_ms = Some(0);
        assert_eq!(ConsumedMessage::from_raw(r, 32).event_time, "1970-01-01 00:00:00");
    }

    #[test]
    fn group_ids_are_unique_per_call() {
        let a = DlqConsumer::group_id("orders-dlq");
        let b = DlqConsumer::group_id("orders-dlq");
        assert!(a.starts_with("dlq-viewer-orders-dlq-"));
        assert_ne!(a, b);
    }
}
