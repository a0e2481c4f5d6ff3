//! Cluster metadata: listing shapes, the TTL cache and the paged fetcher.

pub mod types;
pub mod shapes;
pub mod cache;
pub mod fetcher;

pub use types::{dlq_topic_names, dlq_topics, DataKind, NormalizedRecord};
pub use cache::{CacheEntry, MetadataCache};
pub use fetcher::{FetchOptions, PaginatedFetcher};
