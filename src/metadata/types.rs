use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::ConsoleError;

// ---------- DataKind ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    Topics,
    Brokers,
    ConsumerGroups,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Topics, DataKind::Brokers, DataKind::ConsumerGroups];

    /// Path segment under `/api/clusters/{cluster}/`.
    pub fn api_segment(self) -> &'static str {
        match self {
            DataKind::Topics => "topics",
            DataKind::Brokers => "brokers",
            DataKind::ConsumerGroups => "consumers",
        }
    }

    /// Topic listings feed DLQ derivation and must stay complete and ordered,
    /// so they are paged sequentially.
    pub fn is_order_sensitive(self) -> bool {
        matches!(self, DataKind::Topics)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataKind::Topics => "topics",
            DataKind::Brokers => "brokers",
            DataKind::ConsumerGroups => "consumer-groups",
        };
        f.write_str(name)
    }
}

impl FromStr for DataKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topics" | "topic" => Ok(DataKind::Topics),
            "brokers" | "broker" => Ok(DataKind::Brokers),
            "consumers" | "consumer-groups" | "consumer_groups" | "groups" => Ok(DataKind::ConsumerGroups),
            other => Err(ConsoleError::Configuration(format!(
                "unknown data kind '{}'; expected topics, brokers or consumers",
                other
            ))),
        }
    }
}

// ---------- NormalizedRecord ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NormalizedRecord {
    Topic {
        name: String,
        partition_count: u64,
        size_bytes: u64,
    },
    Broker {
        host: String,
        id: i64,
        port: u16,
    },
    ConsumerGroup {
        group_id: String,
        member_count: u64,
        lag: u64,
    },
}

impl NormalizedRecord {
    /// Display label: topic name, broker host or group id.
    pub fn label(&self) -> &str {
        match self {
            NormalizedRecord::Topic { name, .. } => name,
            NormalizedRecord::Broker { host, .. } => host,
            NormalizedRecord::ConsumerGroup { group_id, .. } => group_id,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            NormalizedRecord::Topic { partition_count, size_bytes, .. } => {
                format!("Partitions: {} | Size: {}", partition_count, size_bytes)
            }
            NormalizedRecord::Broker { id, port, .. } => format!("ID: {} | Port: {}", id, port),
            NormalizedRecord::ConsumerGroup { member_count, lag, .. } => {
                format!("Members: {} | Lag: {}", member_count, lag)
            }
        }
    }
}

/// Topic names containing `marker`, case-insensitively, in listing order.
pub fn dlq_topics(records: &[NormalizedRecord], marker: &str) -> Vec<String> {
    dlq_topic_names(
        records.iter().filter_map(|r| match r {
            NormalizedRecord::Topic { name, .. } => Some(name.as_str()),
            _ => None,
        }),
        marker,
    )
}

/// Same filter over bare topic names, as listed by the brokers.
pub fn dlq_topic_names<'a>(names: impl IntoIterator<Item = &'a str>, marker: &str) -> Vec<String> {
    let marker = marker.to_lowercase();
    names
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&marker))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> NormalizedRecord {
        NormalizedRecord::Topic { name: name.to_string(), partition_count: 1, size_bytes: 0 }
    }

    #[test]
    fn dlq_derivation_is_case_insensitive() {
        let records = vec![topic("orders"), topic("orders-dlq"), topic("PAYMENTS_DLQ")];
        assert_eq!(dlq_topics(&records, "dlq"), vec!["orders-dlq", "PAYMENTS_DLQ"]);
    }

    #[test]
    fn dlq_derivation_ignores_other_kinds() {
        let records = vec![
            NormalizedRecord::Broker { host: "dlq-host".to_string(), id: 1, port: 9092 },
            topic("events.DLQ.v1"),
        ];
        assert_eq!(dlq_topics(&records, "DLQ"), vec!["events.DLQ.v1"]);
    }

    #[test]
    fn kinds_parse_and_map_to_api_paths() {
        assert_eq!("Consumers".parse::<DataKind>().unwrap(), DataKind::ConsumerGroups);
        assert_eq!(DataKind::ConsumerGroups.api_segment(), "consumers");
        assert!(DataKind::Topics.is_order_sensitive());
        assert!(!DataKind::Brokers.is_order_sensitive());
        assert!("partitions".parse::<DataKind>().is_err());
    }

    #[test]
    fn summaries_read_like_the_listing() {
        let group = NormalizedRecord::ConsumerGroup { group_id: "g".to_string(), member_count: 3, lag: 42 };
        assert_eq!(group.label(), "g");
        assert_eq!(group.summary(), "Members: 3 | Lag: 42");
    }
}
