use std::env;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{ConsoleError, Result};

// --- CONFIG AGGREGATOR ---

/// Tunables of the console core. The library never reads the environment on its
/// own: callers build this with `Default` or hand over `ConsoleConfig::from_env()`.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub http: HttpConfig,
    pub metadata: MetadataConfig,
    pub dlq: DlqConfig,
    pub producer: ProducerConfig,
    /// Bound of the command queue. Events are never bounded.
    pub command_channel_capacity: usize,
    pub log_level: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            metadata: MetadataConfig::default(),
            dlq: DlqConfig::default(),
            producer: ProducerConfig::default(),
            command_channel_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Ok(Self {
            http: HttpConfig::load()?,
            metadata: MetadataConfig::load()?,
            dlq: DlqConfig::load()?,
            producer: ProducerConfig::load()?,
            command_channel_capacity: get_env("KCONSOLE_COMMAND_CHAN_CAP", defaults.command_channel_capacity)?,
            log_level: get_env("KCONSOLE_LOG", defaults.log_level)?,
        })
    }
}

// --- MODULES ---

// HTTP (management frontend)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            submit_timeout_ms: 15_000,
            accept_invalid_certs: true,
        }
    }
}

impl HttpConfig {
    fn load() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            request_timeout_ms:   get_env("KCONSOLE_HTTP_TIMEOUT_MS", d.request_timeout_ms)?,
            submit_timeout_ms:    get_env("KCONSOLE_HTTP_SUBMIT_TIMEOUT_MS", d.submit_timeout_ms)?,
            accept_invalid_certs: get_env("KCONSOLE_HTTP_ACCEPT_INVALID_CERTS", d.accept_invalid_certs)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

// METADATA
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub cache_ttl_ms: u64,
    pub max_pages: u32,
    pub page_size: usize,
    pub worker_pool_size: usize,
    pub dlq_marker: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 300_000, // 5 minutes
            max_pages: 5,
            page_size: 100,
            worker_pool_size: 5,
            dlq_marker: "dlq".to_string(),
        }
    }
}

impl MetadataConfig {
    fn load() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            cache_ttl_ms:     get_env("KCONSOLE_CACHE_TTL_MS", d.cache_ttl_ms)?,
            max_pages:        get_env("KCONSOLE_MAX_PAGES", d.max_pages)?,
            page_size:        get_env("KCONSOLE_PAGE_SIZE", d.page_size)?,
            worker_pool_size: get_env("KCONSOLE_FETCH_WORKERS", d.worker_pool_size)?,
            dlq_marker:       get_env("KCONSOLE_DLQ_MARKER", d.dlq_marker)?,
        })
    }
}

// DLQ SAMPLING
#[derive(Debug, Clone)]
pub struct DlqConfig {
    pub max_messages: usize,
    pub idle_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub session_timeout_ms: u64,
    pub metadata_timeout_ms: u64,
    pub fallback_bytes: usize,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_messages: 100,
            idle_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
            session_timeout_ms: 10_000,
            metadata_timeout_ms: 10_000,
            fallback_bytes: 32,
        }
    }
}

impl DlqConfig {
    fn load() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            max_messages:        get_env("KCONSOLE_DLQ_MAX_MESSAGES", d.max_messages)?,
            idle_timeout_ms:     get_env("KCONSOLE_DLQ_IDLE_TIMEOUT_MS", d.idle_timeout_ms)?,
            poll_interval_ms:    get_env("KCONSOLE_DLQ_POLL_MS", d.poll_interval_ms)?,
            session_timeout_ms:  get_env("KCONSOLE_DLQ_SESSION_TIMEOUT_MS", d.session_timeout_ms)?,
            metadata_timeout_ms: get_env("KCONSOLE_DLQ_METADATA_TIMEOUT_MS", d.metadata_timeout_ms)?,
            fallback_bytes:      get_env("KCONSOLE_DLQ_FALLBACK_BYTES", d.fallback_bytes)?,
        })
    }
}

// PRODUCER
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub delivery_timeout_ms: u64,
    pub history_limit: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: 30_000,
            history_limit: 100,
        }
    }
}

impl ProducerConfig {
    fn load() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            delivery_timeout_ms: get_env("KCONSOLE_DELIVERY_TIMEOUT_MS", d.delivery_timeout_ms)?,
            history_limit:       get_env("KCONSOLE_HISTORY_LIMIT", d.history_limit)?,
        })
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConsoleError::Configuration(format!("{} must be valid (got '{}')", key, raw))),
        Err(_) => Ok(default),
    }
}
