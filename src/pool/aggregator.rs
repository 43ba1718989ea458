//! Single-writer actor that folds worker outcomes into batch reports

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::protocol::{BatchReport, TransferResponse};
use crate::observability::Metrics;

/// Messages accepted by the aggregator task
#[derive(Debug)]
pub enum AggregatorMessage {
    /// Open a batch; must arrive before any of its outcomes
    Register {
        request_id: String,
        total: usize,
        responder: oneshot::Sender<BatchReport>,
    },
    Outcome(TransferResponse),
    /// The submitter stopped before handing `undispatched` files to workers
    Abandon {
        request_id: String,
        undispatched: usize,
    },
    /// Report how many batches are still waiting on outcomes
    PendingCount(oneshot::Sender<usize>),
}

/// An outcome arrived for a batch that is not pending
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Received response for unknown request id {0}")]
pub struct CorrelationViolation(pub String);

/// A batch still waiting on some of its outcomes
#[derive(Debug)]
pub struct PendingBatch {
    pub remaining: usize,
    pub report: BatchReport,
    responder: oneshot::Sender<BatchReport>,
}

/// Owns every pending batch; only [`BatchAggregator::run`] touches it
pub struct BatchAggregator {
    pending: HashMap<String, PendingBatch>,
    metrics: Arc<Metrics>,
}

impl BatchAggregator {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            pending: HashMap::new(),
            metrics,
        }
    }

    pub fn register(
        &mut self,
        request_id: String,
        total: usize,
        responder: oneshot::Sender<BatchReport>,
    ) {
        if total == 0 {
            let _ = responder.send(BatchReport::default());
            return;
        }

        debug!(request_id = %request_id, total, "Batch registered");
        self.pending.insert(
            request_id,
            PendingBatch {
                remaining: total,
                report: BatchReport::default(),
                responder,
            },
        );
    }

    /// Apply one outcome. Returns `true` when it completed its batch.
    pub fn record(&mut self, response: TransferResponse) -> Result<bool, CorrelationViolation> {
        let request_id = response.request_id.clone();
        let Some(batch) = self.pending.get_mut(&request_id) else {
            return Err(CorrelationViolation(request_id));
        };

        batch.report.absorb(response);
        batch.remaining = batch.remaining.saturating_sub(1);
        if batch.remaining > 0 {
            return Ok(false);
        }

        self.complete(&request_id);
        Ok(true)
    }

    /// Stop waiting for files that were never dispatched.
    ///
    /// Outcomes for files already with a worker still count; the batch is
    /// released once the last of them arrives.
    pub fn abandon(&mut self, request_id: &str, undispatched: usize) {
        let Some(batch) = self.pending.get_mut(request_id) else {
            return;
        };

        batch.remaining = batch.remaining.saturating_sub(undispatched);
        debug!(
            request_id,
            undispatched,
            remaining = batch.remaining,
            "Batch abandoned during dispatch"
        );
        if batch.remaining == 0 {
            self.complete(request_id);
        }
    }

    fn complete(&mut self, request_id: &str) {
        let Some(PendingBatch {
            report, responder, ..
        }) = self.pending.remove(request_id)
        else {
            return;
        };

        info!(
            request_id,
            succeeded = report.successful_uploads.len(),
            failed = report.failed_uploads.len(),
            "Batch complete"
        );
        if responder.send(report).is_err() {
            warn!(request_id, "Batch submitter went away before completion");
        }
    }

    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    /// Process messages until every sender is dropped.
    ///
    /// Batches still pending at that point are dropped, which their
    /// submitters observe as a closed channel.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<AggregatorMessage>) {
        while let Some(message) = inbox.recv().await {
            match message {
                AggregatorMessage::Register {
                    request_id,
                    total,
                    responder,
                } => self.register(request_id, total, responder),
                AggregatorMessage::Outcome(response) => {
                    if let Err(violation) = self.record(response) {
                        self.metrics.correlation_violation();
                        warn!(error = %violation, "Discarding uncorrelated response");
                    }
                }
                AggregatorMessage::Abandon {
                    request_id,
                    undispatched,
                } => self.abandon(&request_id, undispatched),
                AggregatorMessage::PendingCount(reply) => {
                    let _ = reply.send(self.pending.len());
                }
            }
        }

        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Aggregator stopping with unfinished batches"
            );
        }
        debug!("Aggregator stopped");
    }
}
