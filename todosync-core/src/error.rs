//! Error types shared by the REST and table store clients.

use thiserror::Error;

/// Failure talking to either remote source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The change-notification channel failed.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl RemoteError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }

    /// Status code for `Request` failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Request {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RemoteError::Unavailable(e.to_string())
        }
    }
}

/// Turns a non-success response into `RemoteError::Request`, keeping the
/// body (or the canonical reason when the body is empty) as the message.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body
    };

    Err(RemoteError::Request {
        status: status.as_u16(),
        message: format!("{}: {}", context, detail),
    })
}
