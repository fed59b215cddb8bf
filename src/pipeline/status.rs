//! Per-pipeline status machine and its caller-facing renderings.
//!
//! ```text
//! Idle ──▶ Running ──▶ Succeeded
//!             │  ▲ └──▶ Failed            (terminal, incl. cancelled)
//!             ▼  │
//!      WaitingOnDependency ──┐            (retry, dependency still absent)
//!             ▲──────────────┘
//! ```
//!
//! [`PipelineStatus`] is the internal state, generic over the success
//! payload.  [`StatusView`] is the flat object pushed to the UI and
//! [`StatusEnvelope`] the HTTP body.  Waiting and failure live in separate
//! variants everywhere; neither rendering can carry both.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PipelineError};

// ---------------------------------------------------------------------------
// PipelineKind
// ---------------------------------------------------------------------------

/// The two independently-scheduled pipelines of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Frames,
    Transcription,
}

impl PipelineKind {
    pub fn label(self) -> &'static str {
        match self {
            PipelineKind::Frames => "frames",
            PipelineKind::Transcription => "transcription",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// WaitInfo
// ---------------------------------------------------------------------------

/// Why a pipeline is waiting and roughly for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitInfo {
    pub reason: String,
    pub estimated_wait_secs: u32,
}

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// State of one pipeline.  `T` is the success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStatus<T> {
    Idle,
    /// Work in flight; progress in percent (0–100).
    Running { progress: u8 },
    /// A cross-pipeline precondition is not met yet.  Not a failure.
    WaitingOnDependency(WaitInfo),
    Succeeded(T),
    Failed(PipelineError),
}

impl<T> Default for PipelineStatus<T> {
    fn default() -> Self {
        PipelineStatus::Idle
    }
}

/// Payload-free discriminant of [`PipelineStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    #[serde(rename = "waiting_for_dependency")]
    WaitingOnDependency,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Running => "Running",
            Phase::WaitingOnDependency => "Waiting",
            Phase::Succeeded => "Done",
            Phase::Failed => "Failed",
        }
    }
}

impl<T> PipelineStatus<T> {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineStatus::Idle => Phase::Idle,
            PipelineStatus::Running { .. } => Phase::Running,
            PipelineStatus::WaitingOnDependency(_) => Phase::WaitingOnDependency,
            PipelineStatus::Succeeded(_) => Phase::Succeeded,
            PipelineStatus::Failed(_) => Phase::Failed,
        }
    }

    /// `Succeeded` and `Failed` are terminal; everything else may still move.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded(_) | PipelineStatus::Failed(_)
        )
    }

    pub fn progress(&self) -> u8 {
        match self {
            PipelineStatus::Idle | PipelineStatus::WaitingOnDependency(_) => 0,
            PipelineStatus::Running { progress } => (*progress).min(100),
            PipelineStatus::Succeeded(_) => 100,
            PipelineStatus::Failed(_) => 0,
        }
    }

    pub fn succeeded(&self) -> Option<&T> {
        match self {
            PipelineStatus::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            PipelineStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether an explicit retry of this pipeline is allowed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineStatus::Failed(err) if !err.is_cancelled())
    }

    pub fn view(&self) -> StatusView {
        let mut view = StatusView {
            phase: self.phase(),
            progress_percent: self.progress(),
            waiting_reason: None,
            estimated_wait_seconds: None,
            will_retry: None,
            error_kind: None,
            error_message: None,
        };
        match self {
            PipelineStatus::WaitingOnDependency(info) => {
                view.waiting_reason = Some(info.reason.clone());
                view.estimated_wait_seconds = Some(info.estimated_wait_secs);
                view.will_retry = Some(true);
            }
            PipelineStatus::Failed(err) => {
                view.error_kind = Some(err.kind);
                view.error_message = Some(err.message.clone());
            }
            _ => {}
        }
        view
    }
}

// ---------------------------------------------------------------------------
// StatusView
// ---------------------------------------------------------------------------

/// Flat status object pushed to the UI.  Only `Failed` carries error fields;
/// only `WaitingOnDependency` carries waiting fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub phase: Phase,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_seconds: Option<u32>,
    /// Shown as "will retry automatically" while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_retry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusView {
    /// The UI must render anything but `Failed` without error styling.
    pub fn is_error(&self) -> bool {
        self.phase == Phase::Failed
    }
}

// ---------------------------------------------------------------------------
// StatusEnvelope
// ---------------------------------------------------------------------------

/// HTTP response body for a status query.
///
/// The `status` tag plus the HTTP code from [`http_status`](Self::http_status)
/// are enough to classify a response; message text is for humans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEnvelope {
    Idle,
    Processing {
        progress_percent: u8,
    },
    WaitingForDependency {
        message: String,
        estimated_wait_seconds: u32,
        will_retry: bool,
    },
    Completed,
    Failed {
        error: ErrorKind,
        message: String,
    },
}

impl StatusEnvelope {
    pub fn from_status<T>(status: &PipelineStatus<T>) -> Self {
        match status {
            PipelineStatus::Idle => StatusEnvelope::Idle,
            PipelineStatus::Running { progress } => StatusEnvelope::Processing {
                progress_percent: (*progress).min(100),
            },
            PipelineStatus::WaitingOnDependency(info) => StatusEnvelope::WaitingForDependency {
                message: info.reason.clone(),
                estimated_wait_seconds: info.estimated_wait_secs,
                will_retry: true,
            },
            PipelineStatus::Succeeded(_) => StatusEnvelope::Completed,
            PipelineStatus::Failed(err) => StatusEnvelope::Failed {
                error: err.kind,
                message: err.message.clone(),
            },
        }
    }

    /// 202 for waiting, 200 for idle/processing/completed, and a
    /// kind-specific error code for failures.
    pub fn http_status(&self) -> StatusCode {
        match self {
            StatusEnvelope::WaitingForDependency { .. } => StatusCode::ACCEPTED,
            StatusEnvelope::Idle | StatusEnvelope::Processing { .. } | StatusEnvelope::Completed => {
                StatusCode::OK
            }
            StatusEnvelope::Failed { error, .. } => match error {
                ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                ErrorKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
                ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorKind::Network | ErrorKind::Parse => StatusCode::BAD_GATEWAY,
                ErrorKind::Segmentation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::DependencyFailed => StatusCode::FAILED_DEPENDENCY,
                ErrorKind::Cancelled => StatusCode::CONFLICT,
                ErrorKind::AlignmentGap | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting() -> PipelineStatus<()> {
        PipelineStatus::WaitingOnDependency(WaitInfo {
            reason: "audio extraction in progress".into(),
            estimated_wait_secs: 10,
        })
    }

    fn failed() -> PipelineStatus<()> {
        PipelineStatus::Failed(PipelineError::new(ErrorKind::Timeout, "took too long"))
    }

    #[test]
    fn default_is_idle() {
        assert_eq!(PipelineStatus::<()>::default(), PipelineStatus::Idle);
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(!PipelineStatus::<()>::Idle.is_terminal());
        assert!(!PipelineStatus::<()>::Running { progress: 40 }.is_terminal());
        assert!(!waiting().is_terminal());
        assert!(PipelineStatus::Succeeded(()).is_terminal());
        assert!(failed().is_terminal());
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(PipelineStatus::<()>::Running { progress: 250 }.progress(), 100);
        assert_eq!(PipelineStatus::Succeeded(()).progress(), 100);
    }

    #[test]
    fn waiting_view_has_no_error_fields() {
        let view = waiting().view();
        assert!(!view.is_error());
        assert!(view.error_kind.is_none());
        assert!(view.error_message.is_none());
        assert_eq!(view.will_retry, Some(true));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "waiting_for_dependency");
        assert!(json.get("errorKind").is_none());
        assert!(json.get("errorMessage").is_none());
        assert_eq!(json["estimatedWaitSeconds"], 10);
    }

    #[test]
    fn failed_view_has_no_waiting_fields() {
        let view = failed().view();
        assert!(view.is_error());
        assert!(view.waiting_reason.is_none());
        assert!(view.estimated_wait_seconds.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["errorKind"], "timeout");
        assert!(json.get("waitingReason").is_none());
    }

    #[test]
    fn waiting_envelope_is_202_without_error_or_stack() {
        let envelope = StatusEnvelope::from_status(&waiting());
        assert_eq!(envelope.http_status(), StatusCode::ACCEPTED);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "waiting_for_dependency");
        assert!(json.get("error").is_none());
        assert!(json.get("stack").is_none());
    }

    #[test]
    fn failed_envelope_carries_error_and_no_waiting_tag() {
        let envelope = StatusEnvelope::from_status(&failed());
        assert_eq!(envelope.http_status(), StatusCode::GATEWAY_TIMEOUT);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "timeout");
        assert!(json.get("estimated_wait_seconds").is_none());
    }

    #[test]
    fn waiting_code_differs_from_success_and_error_codes() {
        let waiting = StatusEnvelope::from_status(&waiting()).http_status();
        let done = StatusEnvelope::from_status(&PipelineStatus::Succeeded(())).http_status();
        let failed = StatusEnvelope::from_status(&failed()).http_status();
        assert_ne!(waiting, done);
        assert_ne!(waiting, failed);
        assert!(waiting.is_success());
        assert!(!failed.is_success());
    }

    #[test]
    fn cancelled_failure_is_not_retryable() {
        let cancelled: PipelineStatus<()> = PipelineStatus::Failed(PipelineError::cancelled());
        assert!(!cancelled.is_retryable());
        assert!(failed().is_retryable());
        assert!(!waiting().is_retryable());
    }
}
