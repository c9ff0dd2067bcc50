//! Error types for backend calls and the Google link workflow
//!
//! Errors are recovered locally by whichever component hit them:
//! - ApiError: one failed request, shown inline on the panel that issued it
//! - LinkError: connect/sync failures, shown next to the link control
//!
//! Nothing here is retried automatically. Recovery is the next scheduled poll
//! or a user-triggered refresh.

use thiserror::Error;

/// Text shown when the backend gave no `detail` and the transport failed.
pub const BACKEND_UNREACHABLE: &str =
    "Could not reach the dashboard backend. Please check if the backend is running.";

/// Failure of a single request against the dashboard backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, reset mid-body, etc.
    #[error("Network error: {0}")]
    Transport(String),

    /// Backend answered with a non-2xx status, with its `detail` text if any.
    #[error("Backend error {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    /// Body was not the JSON document we expected at all.
    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Human-readable text for an inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => BACKEND_UNREACHABLE.to_string(),
            ApiError::Status { status, detail } => detail
                .clone()
                .unwrap_or_else(|| format!("Request failed (HTTP {})", status)),
            ApiError::Decode(_) => "Unexpected response from the dashboard backend".to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Failure surfaced by the Google link orchestrator.
///
/// The payload is already user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Sync(String),

    #[error("{0}")]
    Status(String),
}

impl LinkError {
    /// Connect failure, preferring the backend's `detail`.
    pub fn connect(err: &ApiError) -> Self {
        LinkError::Connect(match err {
            ApiError::Status { detail, .. } => detail
                .clone()
                .unwrap_or_else(|| "Failed to connect Google account".to_string()),
            _ => "Failed to connect Google account. Please check if the backend is running."
                .to_string(),
        })
    }

    /// Sync failure, preferring the backend's `detail`.
    pub fn sync(err: &ApiError) -> Self {
        LinkError::Sync(match err {
            ApiError::Status { detail, .. } => {
                detail.clone().unwrap_or_else(|| "Sync failed".to_string())
            }
            _ => "Sync failed. Please check if the backend is running.".to_string(),
        })
    }

    /// Status refresh failure. Never shown globally, only returned to the caller.
    pub fn status(err: &ApiError) -> Self {
        LinkError::Status(err.user_message())
    }
}
