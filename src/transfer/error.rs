use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Too many redirects")]
    RedirectLimitExceeded,

    #[error("Redirect location not found")]
    RedirectLocationMissing,

    #[error("Failed to download file, status code: {0}")]
    UnexpectedStatus(u16),

    #[error("No content-type specified in response headers")]
    MissingContentType,

    #[error("URL points to a web page, not a file")]
    WebPageDetected,

    #[error("Transfer I/O error: {0}")]
    TransferIOError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
