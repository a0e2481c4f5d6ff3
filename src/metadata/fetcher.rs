//! Paged retrieval of cluster listings.
//!
//! Topics are paged strictly in order (DLQ derivation depends on a complete,
//! ordered listing). Brokers and consumer groups fan out over a bounded pool
//! and are merged in arrival order. Any page that fails counts as empty.
//!
//! Cancellation is checked between page dispatches and before merging. A page
//! already on the wire runs to completion and its result is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::auth::AuthSession;
use crate::config::MetadataConfig;
use crate::error::{ConsoleError, Result};
use crate::metadata::cache::{CacheEntry, MetadataCache};
use crate::metadata::shapes::normalize;
use crate::metadata::types::{DataKind, NormalizedRecord};

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub max_pages: u32,
    pub page_size: usize,
    pub workers: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&MetadataConfig::default())
    }
}

impl FetchOptions {
    pub fn from_config(cfg: &MetadataConfig) -> Self {
        Self {
            max_pages: cfg.max_pages.max(1),
            page_size: cfg.page_size.max(1),
            workers: cfg.worker_pool_size.max(1),
        }
    }
}

#[derive(Clone)]
pub struct PaginatedFetcher {
    cache: Arc<MetadataCache>,
    options: FetchOptions,
}

impl PaginatedFetcher {
    pub fn new(cache: Arc<MetadataCache>, options: FetchOptions) -> Self {
        Self { cache, options }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Fetches every page of `kind` and stores the result in the cache.
    /// `Ok(None)` means the fetch was cancelled and nothing was stored.
    pub async fn fetch(
        &self,
        session: Arc<AuthSession>,
        kind: DataKind,
        cancel: &CancellationToken,
    ) -> Result<Option<CacheEntry>> {
        let cluster = session.cluster();
        info!("Loading {} of cluster '{}'", kind, cluster);

        let records = if kind.is_order_sensitive() {
            self.fetch_sequential(&session, kind, &cluster, cancel).await?
        } else {
            self.fetch_concurrent(&session, kind, &cluster, cancel).await?
        };

        let Some(records) = records else {
            info!("Loading {} cancelled, partial data discarded", kind);
            return Ok(None);
        };

        info!("Loaded {} {} records", records.len(), kind);
        Ok(Some(self.cache.put(kind, records)))
    }

    async fn fetch_sequential(
        &self,
        session: &Arc<AuthSession>,
        kind: DataKind,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<NormalizedRecord>>> {
        let mut records = Vec::new();
        for page in 1..=self.options.max_pages {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let items = PageRequest::new(session, kind, cluster, page, self.options.page_size)?
                .run()
                .await;
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let count = items.len();
            records.extend(items);
            if count < self.options.page_size {
                debug!("{} page {} is short ({} records), stopping", kind, page, count);
                break;
            }
        }
        Ok(Some(records))
    }

    async fn fetch_concurrent(
        &self,
        session: &Arc<AuthSession>,
        kind: DataKind,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<NormalizedRecord>>> {
        let pool = Arc::new(Semaphore::new(self.options.workers));
        let last_page_seen = Arc::new(AtomicBool::new(false));
        let page_size = self.options.page_size;
        let mut pages = JoinSet::new();

        for page in 1..=self.options.max_pages {
            if cancel.is_cancelled() {
                pages.detach_all();
                return Ok(None);
            }
            if last_page_seen.load(Ordering::Acquire) {
                debug!("{} short page seen, skipping pages {}..", kind, page);
                break;
            }

            // Waiting for a free slot is not a page in flight.
            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    pages.detach_all();
                    return Ok(None);
                }
                permit = pool.clone().acquire_owned() => permit
                    .map_err(|_| ConsoleError::Network("fetch pool closed".to_string()))?,
            };

            let request = PageRequest::new(session, kind, cluster, page, page_size)?;
            let last_page_seen = last_page_seen.clone();
            pages.spawn(async move {
                let items = request.run().await;
                drop(permit);
                if items.len() < page_size {
                    last_page_seen.store(true, Ordering::Release);
                }
                items
            });
        }

        let mut records = Vec::new();
        while let Some(joined) = pages.join_next().await {
            if cancel.is_cancelled() {
                pages.detach_all();
                return Ok(None);
            }
            match joined {
                Ok(items) => records.extend(items),
                Err(e) => warn!("{} page worker failed: {}", kind, e),
            }
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(records))
    }
}

// ---------- Single page ----------

struct PageRequest {
    session: Arc<AuthSession>,
    kind: DataKind,
    page: u32,
    url: reqwest::Url,
}

impl PageRequest {
    fn new(session: &Arc<AuthSession>, kind: DataKind, cluster: &str, page: u32, page_size: usize) -> Result<Self> {
        let mut url = session.endpoint(&format!("api/clusters/{}/{}", cluster, kind.api_segment()))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("perPage", &page_size.to_string());
        Ok(Self {
            session: session.clone(),
            kind,
            page,
            url,
        })
    }

    /// Normalized records of the page; failures count as an empty page.
    async fn run(self) -> Vec<NormalizedRecord> {
        match self.session.get_json(self.url).await {
            Ok(body) => {
                let items = normalize(self.kind, &body);
                debug!("{} page {}: {} records", self.kind, self.page, items.len());
                items
            }
            Err(e) => {
                warn!("{} page {} treated as empty: {}", self.kind, self.page, e);
                Vec::new()
            }
        }
    }
}
