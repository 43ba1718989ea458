//! Facade tying the pool, storage and metadata store together

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::files::{FilePage, FileRecord, FjallFileStore, MetadataStore, StoreError};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::pool::{BatchReport, PoolError, Services, WorkerPool};
use crate::storage::{ObjectStoreSink, StorageError, StorageSink};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Entry point for uploading batches and reading stored file records
pub struct FilesService {
    pool: WorkerPool,
    store: Arc<dyn MetadataStore>,
    metrics: Arc<Metrics>,
}

impl FilesService {
    /// Build collaborators from configuration and start the worker pool
    pub fn from_config(config: &Config) -> Result<Self> {
        let sink: Arc<dyn StorageSink> = Arc::new(ObjectStoreSink::from_config(&config.storage)?);
        let store: Arc<dyn MetadataStore> = Arc::new(FjallFileStore::open(&config.store.path)?);
        Self::with_services(config, sink, store)
    }

    /// Start with caller-supplied storage and metadata backends
    pub fn with_services(
        config: &Config,
        sink: Arc<dyn StorageSink>,
        store: Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let services = Services {
            sink,
            store: store.clone(),
            metrics: metrics.clone(),
        };
        let pool = WorkerPool::start(&config.pool, &config.http.client_config(), services)?;

        Ok(Self {
            pool,
            store,
            metrics,
        })
    }

    /// Transfer every URL; the report lists each one exactly once
    pub async fn upload_files(&self, urls: Vec<String>) -> Result<BatchReport> {
        Ok(self.pool.submit_batch(urls).await?)
    }

    pub fn find_all(&self, page: usize, limit: usize) -> Result<FilePage> {
        Ok(self.store.find_all(page, limit)?)
    }

    pub fn find_one(&self, id: &str) -> Result<FileRecord> {
        Ok(self.store.find_by_id(id)?)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Drain the pool and flush metadata to disk
    pub async fn shutdown(self) -> Result<()> {
        self.pool.shutdown().await;
        self.store.flush()?;
        info!(metrics = ?self.metrics.snapshot(), "Service stopped");
        Ok(())
    }
}
