use reqwest::StatusCode;
use thiserror::Error;

/// Enumerates the possible errors that can arise while talking to the Civitai API.
///
/// Pagination stores the first of these it hits and stops, so every variant is also a valid
/// terminal state for a [`Paginator`](crate::pagination::Paginator).
#[derive(Error, Debug)]
pub enum ApiError {
    /// An error occurred during a network request (e.g., connection timeout, DNS resolution failure).
    #[error("Connection Error: {0}")]
    Connection(#[from] reqwest::Error),

    /// The server answered, but not with a success status.
    #[error("Server returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// The response body was not in the expected shape.
    #[error("Error while deserializing JSON: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// A continuation or seed URL could not be parsed.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The API key cannot be sent as an HTTP header.
    #[error("API key contains characters that are not allowed in a header")]
    InvalidApiKey,

    /// The caller's cancellation token fired before the fetch completed.
    #[error("Request cancelled")]
    Cancelled,

    /// The caller's deadline passed before the fetch completed.
    #[error("Deadline exceeded while waiting for the server")]
    DeadlineExceeded,
}

impl ApiError {
    /// `true` for errors caused by the caller's cancellation scope rather than by the server.
    #[inline]
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
