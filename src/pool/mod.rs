//! Fixed-size worker pool with batch correlation
//!
//! Architecture:
//! 1. `submit_batch` registers the batch with the aggregator under a fresh
//!    correlation id
//! 2. URL *i* is sent to worker `i % size` over that worker's bounded
//!    channel (backpressure when its queue is full)
//! 3. Each worker transfers its files one at a time and emits exactly one
//!    [`TransferResponse`] per file
//! 4. The aggregator task owns every pending batch and resolves a batch's
//!    oneshot when its last outcome arrives
//!
//! If the submitting future is dropped part way through dispatch, the files
//! never sent are written off with [`AggregatorMessage::Abandon`] so the batch
//! still leaves the aggregator once its dispatched files finish.
//!
//! Workers never talk to each other; all coordination goes through channels.

pub mod aggregator;
pub mod protocol;
pub mod worker;

pub use aggregator::{AggregatorMessage, BatchAggregator, CorrelationViolation};
pub use protocol::{BatchReport, FailedUpload, TransferRequest, TransferResponse};
pub use worker::{TransferError, WorkerContext};

use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::files::MetadataStore;
use crate::observability::Metrics;
use crate::storage::StorageSink;
use crate::transfer::{DownloadError, HttpClientConfig, HttpFetcher};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    ShutDown,

    #[error("Worker pool setup failed: {0}")]
    Setup(#[from] DownloadError),
}

/// One less than the available cores, never below one
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Shared collaborators handed to every worker
#[derive(Clone)]
pub struct Services {
    pub sink: Arc<dyn StorageSink>,
    pub store: Arc<dyn MetadataStore>,
    pub metrics: Arc<Metrics>,
}

/// Writes off the files of a batch that were never handed to a worker
struct DispatchGuard<'a> {
    outcomes: &'a mpsc::UnboundedSender<AggregatorMessage>,
    request_id: &'a str,
    undispatched: usize,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if self.undispatched == 0 {
            return;
        }
        warn!(
            request_id = self.request_id,
            undispatched = self.undispatched,
            "Batch dropped before dispatch finished"
        );
        let _ = self.outcomes.send(AggregatorMessage::Abandon {
            request_id: self.request_id.to_string(),
            undispatched: self.undispatched,
        });
    }
}

pub struct WorkerPool {
    task_senders: Vec<mpsc::Sender<TransferRequest>>,
    outcomes: mpsc::UnboundedSender<AggregatorMessage>,
    workers: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<()>,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    /// Spawn the aggregator and `config.worker_count()` workers
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &PoolConfig,
        http: &HttpClientConfig,
        services: Services,
    ) -> Result<Self, PoolError> {
        let size = config.worker_count().max(1);
        let queue_depth = config.queue_depth.max(1);

        info!(size, queue_depth, "Starting worker pool");

        let (outcomes, inbox) = mpsc::unbounded_channel();
        let aggregator = tokio::spawn(BatchAggregator::new(services.metrics.clone()).run(inbox));

        let mut task_senders = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);

        for worker_id in 0..size {
            let (tx, rx) = mpsc::channel(queue_depth);
            let context = WorkerContext {
                worker_id,
                fetcher: HttpFetcher::new(http)?,
                sink: services.sink.clone(),
                store: services.store.clone(),
                metrics: services.metrics.clone(),
            };
            workers.push(tokio::spawn(context.run(rx, outcomes.clone())));
            task_senders.push(tx);
            debug!(worker_id, "Worker spawned");
        }

        Ok(Self {
            task_senders,
            outcomes,
            workers,
            aggregator,
            metrics: services.metrics,
        })
    }

    /// Transfer every URL and wait for the combined report
    ///
    /// Per-file failures land in the report; only a pool that can no longer
    /// deliver outcomes yields an error.
    pub async fn submit_batch(&self, urls: Vec<String>) -> Result<BatchReport, PoolError> {
        if urls.is_empty() {
            return Ok(BatchReport::default());
        }

        let request_id = Uuid::new_v4().to_string();
        let total = urls.len();
        let (responder, report) = oneshot::channel();

        self.outcomes
            .send(AggregatorMessage::Register {
                request_id: request_id.clone(),
                total,
                responder,
            })
            .map_err(|_| PoolError::ShutDown)?;
        self.metrics.batch_submitted();

        info!(request_id = %request_id, total, "Batch submitted");

        let mut guard = DispatchGuard {
            outcomes: &self.outcomes,
            request_id: &request_id,
            undispatched: total,
        };

        for (index, file_url) in urls.into_iter().enumerate() {
            let worker_idx = index % self.task_senders.len();
            let request = TransferRequest {
                file_url,
                request_id: request_id.clone(),
            };

            if let Err(mpsc::error::SendError(request)) =
                self.task_senders[worker_idx].send(request).await
            {
                // Keep the batch resolvable even though this file never ran
                warn!(worker_idx, url = %request.file_url, "Worker channel closed");
                self.metrics.file_failed();
                self.outcomes
                    .send(AggregatorMessage::Outcome(TransferResponse::failed(
                        request,
                        PoolError::ShutDown,
                    )))
                    .map_err(|_| PoolError::ShutDown)?;
            }
            guard.undispatched -= 1;
        }
        drop(guard);

        report.await.map_err(|_| PoolError::ShutDown)
    }

    /// Batches the aggregator is still tracking
    pub async fn pending_batches(&self) -> Result<usize, PoolError> {
        let (reply, count) = oneshot::channel();
        self.outcomes
            .send(AggregatorMessage::PendingCount(reply))
            .map_err(|_| PoolError::ShutDown)?;
        count.await.map_err(|_| PoolError::ShutDown)
    }

    pub fn size(&self) -> usize {
        self.task_senders.len()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Let workers drain their queues, then stop the aggregator
    ///
    /// Batches that cannot complete fail with [`PoolError::ShutDown`].
    pub async fn shutdown(self) {
        let Self {
            task_senders,
            outcomes,
            workers,
            aggregator,
            ..
        } = self;

        drop(task_senders);
        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                warn!(worker_id, error = %e, "Worker task ended abnormally");
            }
        }

        drop(outcomes);
        if let Err(e) = aggregator.await {
            warn!(error = %e, "Aggregator task ended abnormally");
        }

        info!("Worker pool stopped");
    }
}
