//! HTTP client for streaming downloads

use std::borrow::Cow;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue, LOCATION};
use reqwest::{Client, Response, Url, redirect};
use tracing::{debug, info};

use super::body::{ByteCount, MeteredBody};
use super::error::{DownloadError, Result};
use super::mime_types::mime_for_name;
use super::naming::{has_filename_param, resolve_name};

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Applies to each read, so long transfers stay alive while data flows
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            user_agent: "RelayBox/0.1.0".to_string(),
        }
    }
}

/// A validated response whose body has not been read yet
pub struct Download {
    pub name: String,
    pub mime_type: &'static str,
    pub final_url: Url,
    pub redirects: usize,
    pub content_length: Option<u64>,
    pub body: MeteredBody,
    pub size: ByteCount,
}

/// Streaming downloader with manual redirect handling
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(&config.user_agent)
            // Redirects are followed by hand so each hop can be counted and checked.
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| DownloadError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }

    /// Request `url`, follow redirects, validate headers and resolve the final name.
    ///
    /// Returning is the readiness signal: the name is known and the body is
    /// ready to be streamed. `candidate` is the name derived from the source
    /// URL and is used when the response carries no `Content-Disposition`
    /// filename.
    pub async fn fetch(&self, url: &str, candidate: Option<String>) -> Result<Download> {
        let mut current =
            Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{url}: {e}")))?;
        let mut redirects = 0;

        let response = loop {
            debug!(url = %current, redirects, "Requesting");

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| DownloadError::TransferIOError(e.to_string()))?;

            if !response.status().is_redirection() {
                break response;
            }

            if redirects == MAX_REDIRECTS {
                return Err(DownloadError::RedirectLimitExceeded);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .map(header_text)
                .ok_or(DownloadError::RedirectLocationMissing)?;

            current = current
                .join(&location)
                .map_err(|e| DownloadError::InvalidUrl(format!("{location}: {e}")))?;
            redirects += 1;
        };

        let download = validate(response, candidate, redirects)?;

        info!(
            url,
            final_url = %download.final_url,
            name = %download.name,
            redirects,
            content_length = ?download.content_length,
            "Response validated, streaming body"
        );

        Ok(download)
    }
}

fn validate(response: Response, candidate: Option<String>, redirects: usize) -> Result<Download> {
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::UnexpectedStatus(status.as_u16()));
    }

    let headers = response.headers();
    let content_type = headers
        .get(CONTENT_TYPE)
        .map(header_text)
        .ok_or(DownloadError::MissingContentType)?;
    let disposition = headers.get(CONTENT_DISPOSITION).map(header_text);

    if is_web_page(&content_type) && !disposition.as_deref().is_some_and(has_filename_param) {
        return Err(DownloadError::WebPageDetected);
    }

    let name = resolve_name(disposition.as_deref(), candidate);
    let mime_type = mime_for_name(&name);
    let final_url = response.url().clone();
    let content_length = response.content_length();

    let stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| DownloadError::TransferIOError(e.to_string())))
        .boxed();
    let (body, size) = MeteredBody::new(stream);

    Ok(Download {
        name,
        mime_type,
        final_url,
        redirects,
        content_length,
        body,
        size,
    })
}

/// Header value as text; invalid UTF-8 is replaced rather than dropped
fn header_text(value: &HeaderValue) -> Cow<'_, str> {
    String::from_utf8_lossy(value.as_bytes())
}

/// HTML and plain-text responses are usually landing or error pages
fn is_web_page(content_type: &str) -> bool {
    match content_type.parse::<mime::Mime>() {
        Ok(parsed) => {
            parsed.type_() == mime::TEXT
                && (parsed.subtype() == mime::HTML || parsed.subtype() == mime::PLAIN)
        }
        Err(_) => {
            let lowered = content_type.to_ascii_lowercase();
            lowered.contains("text/html") || lowered.contains("text/plain")
        }
    }
}
