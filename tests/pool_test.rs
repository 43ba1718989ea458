//! Worker pool end to end: mock origin -> pool -> in-memory storage + fjall

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    LARGE_LEN, Origin, REPORT_PDF, closed_port_url, large_body, stalled_origin, start_origin,
};
use object_store::memory::InMemory;
use relaybox::config::PoolConfig;
use relaybox::files::{
    FilePage, FileRecord, FjallFileStore, MetadataStore, NewFileRecord, StoreError,
};
use relaybox::observability::Metrics;
use relaybox::pool::{BatchReport, Services, WorkerPool};
use relaybox::storage::{ObjectStoreSink, SinkOptions};
use relaybox::transfer::HttpClientConfig;
use tempfile::TempDir;

struct Harness {
    pool: WorkerPool,
    sink: Arc<ObjectStoreSink>,
    store: Arc<FjallFileStore>,
    metrics: Arc<Metrics>,
    _temp: TempDir,
}

fn small_parts_sink() -> Arc<ObjectStoreSink> {
    Arc::new(ObjectStoreSink::new(
        Arc::new(InMemory::new()),
        SinkOptions {
            part_size: 256 * 1024,
            max_concurrent_parts: 2,
            ..SinkOptions::default()
        },
    ))
}

fn pool_config(workers: usize) -> PoolConfig {
    PoolConfig {
        workers: Some(workers),
        queue_depth: 2,
    }
}

fn harness(workers: usize) -> Harness {
    harness_with(pool_config(workers))
}

fn harness_with(config: PoolConfig) -> Harness {
    let temp = TempDir::new().unwrap();
    let sink = small_parts_sink();
    let store = Arc::new(FjallFileStore::open(temp.path().join("files")).unwrap());
    let metrics = Arc::new(Metrics::new());

    let services = Services {
        sink: sink.clone(),
        store: store.clone(),
        metrics: metrics.clone(),
    };
    let pool = WorkerPool::start(&config, &HttpClientConfig::default(), services).unwrap();

    Harness {
        pool,
        sink,
        store,
        metrics,
        _temp: temp,
    }
}

async fn submit(pool: &WorkerPool, urls: Vec<String>) -> BatchReport {
    tokio::time::timeout(Duration::from_secs(30), pool.submit_batch(urls))
        .await
        .expect("batch did not resolve")
        .unwrap()
}

fn mixed_urls(origin: &Origin) -> Vec<String> {
    vec![
        origin.url("/files/report.pdf"),
        origin.url("/page"),
        origin.url("/missing"),
        origin.url("/large.bin"),
        origin.url("/hop/11"),
        origin.url("/attachment"),
        origin.url("/no-type"),
    ]
}

fn error_for<'a>(report: &'a BatchReport, url: &str) -> &'a str {
    report
        .failed_uploads
        .iter()
        .find(|f| f.url == url)
        .map(|f| f.error.as_str())
        .unwrap_or_else(|| panic!("no failure recorded for {}", url))
}

async fn check_mixed_batch(workers: usize) {
    let origin = start_origin().await;
    let h = harness(workers);
    let mut urls = mixed_urls(&origin);
    urls.push(closed_port_url().await);

    let report = submit(&h.pool, urls.clone()).await;

    assert_eq!(report.len(), urls.len());
    assert_eq!(report.successful_uploads.len(), 3);
    assert_eq!(report.failed_uploads.len(), 5);

    assert_eq!(
        error_for(&report, &origin.url("/page")),
        "URL points to a web page, not a file"
    );
    assert_eq!(
        error_for(&report, &origin.url("/missing")),
        "Failed to download file, status code: 404"
    );
    assert_eq!(error_for(&report, &origin.url("/hop/11")), "Too many redirects");
    assert_eq!(
        error_for(&report, &origin.url("/no-type")),
        "No content-type specified in response headers"
    );

    let mut names: Vec<_> = report
        .successful_uploads
        .iter()
        .map(|r| r.original_name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.pdf", "large.bin", "report.pdf"]);

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.batches_submitted, 1);
    assert_eq!(snapshot.files_succeeded, 3);
    assert_eq!(snapshot.files_failed, 5);
    assert_eq!(
        snapshot.bytes_transferred,
        (REPORT_PDF.len() + LARGE_LEN + "pretend pdf".len()) as u64
    );

    h.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_url_reported_with_single_worker() {
    check_mixed_batch(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_url_reported_with_three_workers() {
    check_mixed_batch(3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stored_bytes_and_record_match_source() {
    let origin = start_origin().await;
    let h = harness(2);
    let url = origin.url("/large.bin");

    let report = submit(&h.pool, vec![url.clone()]).await;

    assert!(report.failed_uploads.is_empty());
    let record = &report.successful_uploads[0];
    assert_eq!(record.size, LARGE_LEN as u64);
    assert_eq!(record.mime_type, "application/octet-stream");
    assert_eq!(record.original_url, url);
    assert!(record.storage_id.starts_with("uploads/"));
    assert!(record.storage_id.ends_with("/large.bin"));
    assert_eq!(
        record.storage_url,
        format!("memory://relaybox/{}", record.storage_id)
    );

    let stored = h.sink.read(&record.storage_id).await.unwrap();
    assert_eq!(stored.len(), LARGE_LEN);
    assert!(stored.as_ref() == large_body().as_slice());

    assert_eq!(&h.store.find_by_id(&record.id).unwrap(), record);

    h.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_do_not_mix() {
    let origin = start_origin().await;
    let h = harness(3);

    let batch = |tag: &str| -> Vec<String> {
        (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    origin.url(&format!("/files/report.pdf?batch={}&i={}", tag, i))
                } else {
                    origin.url(&format!("/missing?batch={}&i={}", tag, i))
                }
            })
            .collect()
    };
    let urls_a = batch("a");
    let urls_b = batch("b");

    let (report_a, report_b) = tokio::join!(
        submit(&h.pool, urls_a.clone()),
        submit(&h.pool, urls_b.clone())
    );

    for (report, urls) in [(&report_a, &urls_a), (&report_b, &urls_b)] {
        assert_eq!(report.successful_uploads.len(), 3);
        assert_eq!(report.failed_uploads.len(), 3);

        let mut seen: Vec<&str> = report
            .successful_uploads
            .iter()
            .map(|r| r.original_url.as_str())
            .chain(report.failed_uploads.iter().map(|f| f.url.as_str()))
            .collect();
        seen.sort();
        let mut expected: Vec<&str> = urls.iter().map(String::as_str).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    assert_eq!(h.metrics.snapshot().batches_submitted, 2);
    h.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_truncated_source_fails_only_its_file() {
    let origin = start_origin().await;
    let h = harness(2);
    let truncated = origin.url("/truncated");

    let report = submit(&h.pool, vec![truncated.clone(), origin.url("/files/report.pdf")]).await;

    assert_eq!(report.successful_uploads.len(), 1);
    assert!(error_for(&report, &truncated).starts_with("Transfer I/O error"));
    assert_eq!(h.store.find_all(1, 10).unwrap().total, 1);

    h.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_batch() {
    let h = harness(2);
    let report = submit(&h.pool, Vec::new()).await;
    assert!(report.is_empty());
    h.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_submit_releases_its_batch() {
    let origin = stalled_origin(Duration::from_millis(200)).await;
    let h = harness_with(PoolConfig {
        workers: Some(1),
        queue_depth: 1,
    });
    let urls: Vec<String> = (0..5).map(|i| origin.url(&format!("/slow/{}", i))).collect();

    // the single worker is busy and its queue is full, so dispatch is cut short
    let cut = tokio::time::timeout(Duration::from_millis(100), h.pool.submit_batch(urls)).await;
    assert!(cut.is_err());

    let mut pending = h.pool.pending_batches().await.unwrap();
    for _ in 0..100 {
        if pending == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        pending = h.pool.pending_batches().await.unwrap();
    }
    assert_eq!(pending, 0);

    // the pool still serves new batches
    let report = submit(&h.pool, vec![origin.url("/slow/again")]).await;
    assert_eq!(report.failed_uploads.len(), 1);
    assert_eq!(h.pool.pending_batches().await.unwrap(), 0);

    h.pool.shutdown().await;
}

/// Store that panics on save
struct ExplodingStore;

impl MetadataStore for ExplodingStore {
    fn save(&self, _record: NewFileRecord) -> relaybox::files::Result<FileRecord> {
        panic!("disk on fire")
    }

    fn find_all(&self, page: usize, limit: usize) -> relaybox::files::Result<FilePage> {
        Err(StoreError::InvalidPage { page, limit })
    }

    fn find_by_id(&self, id: &str) -> relaybox::files::Result<FileRecord> {
        Err(StoreError::NotFound(id.to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_worker_still_resolves_batch() {
    let origin = start_origin().await;
    let metrics = Arc::new(Metrics::new());
    let services = Services {
        sink: small_parts_sink(),
        store: Arc::new(ExplodingStore),
        metrics: metrics.clone(),
    };
    let pool =
        WorkerPool::start(&pool_config(1), &HttpClientConfig::default(), services).unwrap();
    let url = origin.url("/files/report.pdf");

    let first = submit(&pool, vec![url.clone()]).await;
    assert_eq!(error_for(&first, &url), "Worker panicked: disk on fire");

    // the worker survives and keeps serving
    let second = submit(&pool, vec![url.clone(), origin.url("/missing")]).await;
    assert_eq!(second.failed_uploads.len(), 2);
    assert_eq!(metrics.snapshot().files_failed, 3);

    pool.shutdown().await;
}
