use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::oneshot;

use super::error::{DownloadError, Result};

/// Boxed source of body chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response body that counts bytes as they pass through.
///
/// The total is published to the paired [`ByteCount`] only when the source
/// ends cleanly. An error from the source, or dropping the body before the
/// end, leaves the count unresolved.
pub struct MeteredBody {
    inner: ByteStream,
    observed: u64,
    total_tx: Option<oneshot::Sender<u64>>,
}

/// Total size of a [`MeteredBody`], available after the body has ended
#[derive(Debug)]
pub struct ByteCount {
    rx: oneshot::Receiver<u64>,
}

impl MeteredBody {
    pub fn new(inner: ByteStream) -> (Self, ByteCount) {
        let (tx, rx) = oneshot::channel();
        let body = Self {
            inner,
            observed: 0,
            total_tx: Some(tx),
        };
        (body, ByteCount { rx })
    }

    /// Bytes seen so far
    pub fn observed(&self) -> u64 {
        self.observed
    }
}

impl Stream for MeteredBody {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.observed += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.total_tx = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(tx) = this.total_tx.take() {
                    // Receiver may be gone if the caller stopped caring about the size.
                    let _ = tx.send(this.observed);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl ByteCount {
    /// Wait for the body to end and return its total size
    pub async fn total(self) -> Result<u64> {
        self.rx.await.map_err(|_| {
            DownloadError::TransferIOError("body stream ended before completion".to_string())
        })
    }
}
