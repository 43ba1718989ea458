//! Per-worker transfer pipeline

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::aggregator::AggregatorMessage;
use super::protocol::{TransferRequest, TransferResponse};
use crate::files::{FileRecord, MetadataStore, NewFileRecord, StoreError};
use crate::observability::Metrics;
use crate::storage::{StorageError, StorageSink};
use crate::transfer::{Download, DownloadError, HttpFetcher, candidate_name};

/// Why a single file did not make it into storage
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Persist(#[from] StoreError),

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

impl From<StorageError> for TransferError {
    fn from(err: StorageError) -> Self {
        match err {
            // The body broke mid-upload; report the transfer cause
            StorageError::Interrupted(cause) => TransferError::Download(cause),
            other => TransferError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Everything one worker needs, built once at pool start
pub struct WorkerContext {
    pub worker_id: usize,
    pub fetcher: HttpFetcher,
    pub sink: Arc<dyn StorageSink>,
    pub store: Arc<dyn MetadataStore>,
    pub metrics: Arc<Metrics>,
}

impl WorkerContext {
    /// Fetch, upload and record one URL
    pub async fn process(&self, url: &str) -> Result<FileRecord> {
        let Download {
            name,
            mime_type,
            final_url,
            redirects,
            body,
            size,
            ..
        } = self.fetcher.fetch(url, candidate_name(url)).await?;

        debug!(
            worker_id = self.worker_id,
            url,
            final_url = %final_url,
            redirects,
            name = %name,
            "Source ready, streaming to storage"
        );

        let artifact = self.sink.upload(body, &name).await?;
        let size = size.total().await?;

        let record = self.store.save(NewFileRecord {
            original_name: name,
            mime_type: mime_type.to_string(),
            size,
            storage_id: artifact.id,
            storage_url: artifact.url,
            original_url: url.to_string(),
        })?;

        Ok(record)
    }

    /// Turn one request into exactly one response, whatever happens
    pub async fn handle(&self, request: TransferRequest) -> TransferResponse {
        let outcome = AssertUnwindSafe(self.process(&request.file_url))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TransferError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok(record) => {
                self.metrics.file_succeeded(record.size);
                info!(
                    worker_id = self.worker_id,
                    url = %request.file_url,
                    id = %record.id,
                    size = record.size,
                    "File stored"
                );
                TransferResponse::succeeded(request, record)
            }
            Err(e) => {
                self.metrics.file_failed();
                warn!(
                    worker_id = self.worker_id,
                    url = %request.file_url,
                    error = %e,
                    "File transfer failed"
                );
                TransferResponse::failed(request, e)
            }
        }
    }

    /// Work through queued requests one at a time until the queue closes
    pub async fn run(
        self,
        mut tasks: mpsc::Receiver<TransferRequest>,
        outcomes: mpsc::UnboundedSender<AggregatorMessage>,
    ) {
        info!(worker_id = self.worker_id, "Worker started");

        while let Some(request) = tasks.recv().await {
            let response = self.handle(request).await;
            if outcomes.send(AggregatorMessage::Outcome(response)).is_err() {
                error!(worker_id = self.worker_id, "Aggregator gone, stopping worker");
                break;
            }
        }

        info!(worker_id = self.worker_id, "Worker stopped");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
