//! Flattening of the management API's list envelopes into `NormalizedRecord`s.

use serde_json::{Map, Value};
use tracing::debug;
use crate::error::{ConsoleError, Result};
use crate::metadata::types::{DataKind, NormalizedRecord};

/// One way a list can be wrapped in a response body.
#[derive(Debug, Clone, Copy)]
enum Shape {
    BareArray,
    Envelope(&'static str),
    FirstArrayField,
}

const LISTING_SHAPES: &[Shape] = &[
    Shape::BareArray,
    Shape::Envelope("content"),
    Shape::Envelope("topicList"),
    Shape::Envelope("topics"),
    Shape::Envelope("brokers"),
    Shape::Envelope("consumers"),
    Shape::FirstArrayField,
];

const CLUSTER_SHAPES: &[Shape] = &[
    Shape::BareArray,
    Shape::Envelope("clusters"),
    Shape::Envelope("content"),
];

impl Shape {
    fn extract(self, body: &Value) -> Option<&[Value]> {
        match (self, body) {
            (Shape::BareArray, Value::Array(items)) => Some(items.as_slice()),
            (Shape::Envelope(key), Value::Object(map)) => map.get(key)?.as_array().map(Vec::as_slice),
            (Shape::FirstArrayField, Value::Object(map)) => {
                map.values().find_map(|v| v.as_array()).map(Vec::as_slice)
            }
            _ => None,
        }
    }
}

fn first_matching<'a>(shapes: &[Shape], body: &'a Value) -> Result<&'a [Value]> {
    shapes
        .iter()
        .find_map(|shape| shape.extract(body))
        .ok_or_else(|| ConsoleError::ApiFormat("no list found in response body".to_string()))
}

/// Extracts the listing of one page. Unknown shapes are an `ApiFormat` error,
/// which callers turn into an empty page.
pub fn extract_items(body: &Value) -> Result<&[Value]> {
    first_matching(LISTING_SHAPES, body)
}

pub fn normalize(kind: DataKind, body: &Value) -> Vec<NormalizedRecord> {
    let items = match extract_items(body) {
        Ok(items) => items,
        Err(e) => {
            debug!("{} page ignored: {}", kind, e);
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| normalize_one(kind, obj))
        .collect()
}

fn normalize_one(kind: DataKind, obj: &Map<String, Value>) -> NormalizedRecord {
    match kind {
        DataKind::Topics => NormalizedRecord::Topic {
            name: text(obj, &["name", "topicName"]),
            partition_count: count(obj, &["partitionCount", "partitions"]),
            size_bytes: count(obj, &["segmentSize", "size", "sizeBytes"]),
        },
        DataKind::Brokers => NormalizedRecord::Broker {
            host: text(obj, &["host"]),
            id: number(obj, &["id", "brokerId"]).unwrap_or(0),
            port: number(obj, &["port"]).and_then(|p| u16::try_from(p).ok()).unwrap_or(0),
        },
        DataKind::ConsumerGroups => NormalizedRecord::ConsumerGroup {
            group_id: text(obj, &["groupId", "group_id", "name"]),
            member_count: count(obj, &["members", "memberCount", "membersCount"]),
            lag: count(obj, &["consumerLag", "lag", "messagesBehind"]),
        },
    }
}

/// Cluster names from `/api/clusters`, in listing order.
pub fn cluster_names(body: &Value) -> Vec<String> {
    first_matching(CLUSTER_SHAPES, body)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ---------- Field readers ----------

fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Non-negative quantity; arrays count their elements.
fn count(obj: &Map<String, Value>, keys: &[&str]) -> u64 {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::Array(items) => Some(items.len() as u64),
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}
