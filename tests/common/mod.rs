//! Mock origin server shared by the integration tests
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures_util::stream;
use std::net::SocketAddr;
use std::time::Duration;

pub const REPORT_PDF: &[u8] = b"%PDF-1.4\n% relaybox fixture\n1 0 obj << >> endobj\n%%EOF\n";

/// Size of `/large.bin`; spans several upload parts in the tests
pub const LARGE_LEN: usize = 3 * 1024 * 1024 + 17;

/// Deterministic payload served by `/large.bin`
pub fn large_body() -> Vec<u8> {
    (0..LARGE_LEN).map(|i| (i % 251) as u8).collect()
}

pub struct Origin {
    pub base: String,
}

impl Origin {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Serve the fixture routes on a random local port
pub async fn start_origin() -> Origin {
    let app = Router::new()
        .route("/", get(root))
        .route("/files/report.pdf", get(report))
        .route("/hop/{n}", get(hop))
        .route("/nested/start", get(nested_start))
        .route("/nested/final.csv", get(nested_final))
        .route("/page", get(page))
        .route("/attachment", get(attachment))
        .route("/plain-attachment", get(plain_attachment))
        .route("/unicode-attachment", get(unicode_attachment))
        .route("/no-type", get(no_type))
        .route("/missing", get(missing))
        .route("/broken-redirect", get(broken_redirect))
        .route("/large.bin", get(large))
        .route("/truncated", get(truncated));

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Origin {
        base: format!("http://{}", bound_addr),
    }
}

/// A URL on a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/gone.bin", addr)
}

/// A server that accepts connections, never answers, and hangs up after `hold`
pub async fn stalled_origin(hold: Duration) -> Origin {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(hold).await;
                drop(socket);
            });
        }
    });

    Origin {
        base: format!("http://{}", addr),
    }
}

async fn root() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], "root bytes")
}

async fn report() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/pdf")], REPORT_PDF)
}

/// `/hop/N` redirects to `/hop/N-1`; `/hop/0` is the file
async fn hop(Path(n): Path<u32>) -> Response {
    if n == 0 {
        return ([(header::CONTENT_TYPE, "application/octet-stream")], "landed").into_response();
    }
    (StatusCode::FOUND, [(header::LOCATION, format!("/hop/{}", n - 1))]).into_response()
}

async fn nested_start() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "final.csv")])
}

async fn nested_final() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv")], "a,b\n1,2\n")
}

async fn page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body>not a file</body></html>",
    )
}

async fn attachment() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"a.pdf\""),
        ],
        "pretend pdf",
    )
}

async fn plain_attachment() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CONTENT_DISPOSITION, "attachment; filename=notes.txt"),
        ],
        "remember the milk",
    )
}

/// HTML response whose filename is raw UTF-8 rather than RFC 5987 encoded
async fn unicode_attachment() -> Response {
    let disposition = "attachment; filename=\"résumé.pdf\"";
    Response::builder()
        .header(header::CONTENT_TYPE, "text/html")
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_bytes(disposition.as_bytes()).unwrap(),
        )
        .body(Body::from("pretend pdf"))
        .unwrap()
}

async fn no_type() -> Response {
    Response::new(Body::from("mystery"))
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn broken_redirect() -> StatusCode {
    StatusCode::FOUND
}

/// `/large.bin` streamed in uneven chunks
async fn large() -> Response {
    let body = large_body();
    let sizes = [1000, 65_536, 7, 300_000];
    let mut chunks = Vec::new();
    let mut offset = 0;
    for size in sizes.iter().cycle() {
        if offset >= body.len() {
            break;
        }
        let end = (offset + size).min(body.len());
        chunks.push(Ok::<_, std::io::Error>(Bytes::copy_from_slice(&body[offset..end])));
        offset = end;
    }

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(stream::iter(chunks)))
        .unwrap()
}

/// Sends part of a body, then fails the connection
async fn truncated() -> Response {
    let chunks = stream::unfold(0u8, |state| async move {
        match state {
            0 => Some((Ok(Bytes::from_static(b"first half of the archive")), 1)),
            1 => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Some((Err(std::io::Error::other("origin died")), 2))
            }
            _ => None,
        }
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .body(Body::from_stream(chunks))
        .unwrap()
}
