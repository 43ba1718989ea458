use crate::humanize::ByteSize;
use crate::transfer::HttpClientConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Fixed worker count; derived from available cores when unset
    pub workers: Option<usize>,
    /// Tasks each worker may have queued before `submit_batch` waits
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl PoolConfig {
    /// Configured worker count, or one less than the available cores (at least 1)
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(crate::pool::default_pool_size)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_queue_depth() -> usize {
    64
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl HttpConfig {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    format!("RelayBox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    60
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Memory,
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the `local` provider
    pub root: Option<PathBuf>,
    /// Folder every upload lands under
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_part_size")]
    pub part_size: ByteSize,
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            root: None,
            destination: default_destination(),
            public_base_url: default_public_base_url(),
            part_size: default_part_size(),
            max_concurrent_parts: default_max_concurrent_parts(),
        }
    }
}

fn default_destination() -> String {
    "uploads".to_string()
}

fn default_public_base_url() -> String {
    "memory://relaybox".to_string()
}

fn default_part_size() -> ByteSize {
    ByteSize(5 * 1024 * 1024) // 5 MB
}

fn default_max_concurrent_parts() -> usize {
    4
}

/// Metadata store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/files")
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
