//! Error taxonomy shared by every pipeline.
//!
//! [`ErrorKind`] is the stable, machine-readable classification surfaced to
//! callers.  [`ServiceError`] is what the HTTP clients for the external
//! services return; [`PipelineError`] is the terminal failure recorded in a
//! pipeline's status (kind + human-readable message).
//!
//! Waiting on a dependency is deliberately absent from this module: it is a
//! status, not an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Classification of a terminal pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The service rejected our credentials.
    Authentication,
    /// The account has run out of paid quota.
    QuotaExceeded,
    /// Too many requests in a short window.
    RateLimit,
    /// Connection, DNS or TLS failure, or an unexpected non-2xx status.
    Network,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The service cannot process the video/audio container or codec.
    UnsupportedFormat,
    /// The service answered with a body we could not understand.
    Parse,
    /// Re-chunking a transcript into fixed windows failed.
    Segmentation,
    /// A timestamp slot had no counterpart during alignment.  Reported in
    /// validation results, never raised.
    AlignmentGap,
    /// The frame pipeline failed and the policy forbids degrading.
    DependencyFailed,
    /// The pipeline was cancelled; never retried.
    Cancelled,
    /// A pipeline task died unexpectedly (panic or runtime shutdown).
    Internal,
}

impl ErrorKind {
    /// Wire label used in status objects and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::QuotaExceeded => "quota_exceeded_error",
            ErrorKind::RateLimit => "rate_limit_error",
            ErrorKind::Network => "network_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::UnsupportedFormat => "unsupported_format_error",
            ErrorKind::Parse => "parse_error",
            ErrorKind::Segmentation => "segmentation_error",
            ErrorKind::AlignmentGap => "alignment_gap_error",
            ErrorKind::DependencyFailed => "dependency_failed_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors returned by the clients of the external frame and speech services.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("authentication rejected ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse service response: {0}")]
    Parse(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Authentication { .. } => ErrorKind::Authentication,
            ServiceError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            ServiceError::RateLimited(_) => ErrorKind::RateLimit,
            ServiceError::Network(_) => ErrorKind::Network,
            ServiceError::Timeout => ErrorKind::Timeout,
            ServiceError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ServiceError::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Classify a non-2xx HTTP response.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ServiceError::Authentication { status, body },
            402 => ServiceError::QuotaExceeded(body),
            429 => ServiceError::RateLimited(body),
            408 | 504 => ServiceError::Timeout,
            415 | 422 => ServiceError::UnsupportedFormat(body),
            _ => ServiceError::Network(format!("unexpected status {status}: {body}")),
        }
    }
}

/// Pass 2xx responses through; turn anything else into a classified
/// [`ServiceError`] carrying the response body for debugging.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
    Err(ServiceError::from_status(status.as_u16(), body))
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// A terminal pipeline failure as surfaced to the caller: kind + message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled before completion")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<ServiceError> for PipelineError {
    fn from(e: ServiceError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        let cases = [
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Authentication),
            (402, ErrorKind::QuotaExceeded),
            (429, ErrorKind::RateLimit),
            (504, ErrorKind::Timeout),
            (415, ErrorKind::UnsupportedFormat),
            (422, ErrorKind::UnsupportedFormat),
            (500, ErrorKind::Network),
            (404, ErrorKind::Network),
        ];
        for (status, kind) in cases {
            assert_eq!(
                ServiceError::from_status(status, "body".into()).kind(),
                kind,
                "status {status}"
            );
        }
    }

    #[test]
    fn pipeline_error_keeps_kind_and_message() {
        let err: PipelineError = ServiceError::UnsupportedFormat("video/x-flv".into()).into();
        assert_eq!(err.kind, ErrorKind::UnsupportedFormat);
        assert!(err.message.contains("video/x-flv"));
        assert!(err.to_string().starts_with("unsupported_format_error"));
    }

    #[test]
    fn kind_serialises_snake_case() {
        let json = serde_json::to_string(&ErrorKind::QuotaExceeded).unwrap();
        assert_eq!(json, "\"quota_exceeded\"");
    }

    #[test]
    fn cancelled_is_recognised() {
        assert!(PipelineError::cancelled().is_cancelled());
        assert!(!PipelineError::new(ErrorKind::Timeout, "slow").is_cancelled());
    }
}
