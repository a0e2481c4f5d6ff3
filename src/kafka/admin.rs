//! Cluster view straight from the bootstrap servers, without the management
//! frontend: connection test and the producer's topic picker.

use std::sync::Arc;
use serde::Serialize;
use tracing::{error, info};
use crate::error::{ConsoleError, Result};
use crate::kafka::{BrokerTransport, ConnectionConfig};
use crate::metadata::{dlq_topic_names, NormalizedRecord};

pub const NO_BROKERS_FOUND: &str = "no brokers found";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BrokerListing {
    /// `NormalizedRecord::Broker` entries, in metadata order.
    pub brokers: Vec<NormalizedRecord>,
    pub topics: Vec<String>,
}

impl BrokerListing {
    pub fn dlq_topics(&self, marker: &str) -> Vec<String> {
        dlq_topic_names(self.topics.iter().map(String::as_str), marker)
    }

    /// `Broker {id}: {host}:{port}` per broker.
    pub fn broker_lines(&self) -> Vec<String> {
        self.brokers
            .iter()
            .filter_map(|b| match b {
                NormalizedRecord::Broker { host, id, port } => Some(format!("Broker {}: {}:{}", id, host, port)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct ClusterInspector {
    transport: Arc<dyn BrokerTransport>,
}

impl ClusterInspector {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        Self { transport }
    }

    /// Lists brokers and topics. A cluster answering with no broker at all is
    /// a failed connection.
    pub async fn list(&self, config: &ConnectionConfig) -> Result<BrokerListing> {
        config.validate()?;

        let listing = match self.transport.list_cluster(config).await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Cluster listing via {} failed: {}", config.bootstrap_servers.join(","), e);
                return Err(e);
            }
        };
        if listing.brokers.is_empty() {
            return Err(ConsoleError::Broker(NO_BROKERS_FOUND.to_string()));
        }

        info!("Cluster lists {} brokers and {} topics", listing.brokers.len(), listing.topics.len());
        Ok(listing)
    }
}
