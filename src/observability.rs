//! Metrics counters and tracing setup

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"info"` or
/// `"relaybox=debug"`) is used. Calling this twice is a no-op.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Process-wide transfer counters
#[derive(Debug, Default)]
pub struct Metrics {
    batches_submitted: AtomicU64,
    files_succeeded: AtomicU64,
    files_failed: AtomicU64,
    bytes_transferred: AtomicU64,
    correlation_violations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_submitted(&self) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_submitted", "Metric incremented");
    }

    /// Count a stored file and the bytes it carried
    pub fn file_succeeded(&self, bytes: u64) {
        self.files_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "files_succeeded", bytes, "Metric incremented");
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_failed", "Metric incremented");
    }

    pub fn correlation_violation(&self) {
        self.correlation_violations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "correlation_violations", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            files_succeeded: self.files_succeeded.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            correlation_violations: self.correlation_violations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub batches_submitted: u64,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub bytes_transferred: u64,
    pub correlation_violations: u64,
}
