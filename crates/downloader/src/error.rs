//! Download error types.

/// Errors from the mirror selector and the download orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The final response came from the upstream login host: the archive does
    /// not exist upstream.
    #[error("no redirect happened, the archive could not be downloaded")]
    NoRedirect,

    /// The response body does not start with the ZIP magic.
    #[error("downloaded file is not a zip archive")]
    NotAZip,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DownloadResult<T> = Result<T, DownloadError>;
