//! Transfer stage
//!
//! Fetches a remote file, follows redirects by hand, rejects responses that
//! look like web pages, resolves the final file name and hands back the body
//! as a metered stream that is never buffered in full.
//!
//! ```text
//! Requesting ──3xx──▶ Requesting ──2xx──▶ Validating ──▶ Streaming ──▶ Complete
//!      └──────────────────┴─────────────────────┴─────────────┴──▶ Failed
//! ```

mod body;
mod error;
mod fetch;
mod mime_types;
mod naming;

pub use body::{ByteCount, ByteStream, MeteredBody};
pub use error::{DownloadError, Result};
pub use fetch::{Download, HttpClientConfig, HttpFetcher, MAX_REDIRECTS};
pub use mime_types::mime_for_name;
pub use naming::{candidate_name, filename_from_disposition, generated_name};
