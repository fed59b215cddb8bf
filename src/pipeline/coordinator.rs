//! Retry/status coordinator: runs both pipelines of a submission.
//!
//! # Flow
//!
//! ```text
//! run(submission)
//!   ├─ spawn frames task ──────────▶ FramePipeline::run
//!   │                                  └─ publishes handle ─┐
//!   └─ spawn transcription task                             │
//!        loop:                                              ▼
//!          attempt ─▶ Waiting ─▶ sleep(interval) ─▶ attempt again
//!                  └▶ Complete / Failed
//!   join both ──▶ align if both succeeded
//! ```
//!
//! Every status change is written to the [`Submission`] and broadcast on the
//! [`StatusBus`].  Failures are terminal and only retried on request via
//! [`Coordinator::retry_pipeline`] / [`Coordinator::retry_segmentation`].

use std::sync::Arc;

use thiserror::Error;

use crate::align::AlignmentEngine;
use crate::config::{AppConfig, DependencyPolicy, RetryConfig};
use crate::error::{ErrorKind, PipelineError};
use crate::frames::{FramePipeline, FrameSample, HttpFrameService};
use crate::transcription::{
    HttpSpeechService, TranscriptOutput, TranscriptionOutcome, TranscriptionPipeline,
    WindowSegmenter,
};

use super::events::{StatusBus, StatusEvent};
use super::state::{Submission, SubmissionSnapshot};
use super::status::{Phase, PipelineKind, PipelineStatus, StatusView};

// ---------------------------------------------------------------------------
// RetryError
// ---------------------------------------------------------------------------

/// Why a manual retry was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("{0} pipeline was cancelled and is never retried")]
    Cancelled(PipelineKind),

    #[error("{kind} pipeline is {phase:?}; only failed pipelines can be retried")]
    NotFailed { kind: PipelineKind, phase: Phase },

    #[error("segmented transcript has not failed")]
    SegmentationNotFailed,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives submissions.  Cheap to clone; every clone shares the same
/// services and status bus.
#[derive(Clone)]
pub struct Coordinator {
    frames: FramePipeline,
    transcription: TranscriptionPipeline,
    alignment: AlignmentEngine,
    retry: RetryConfig,
    policy: DependencyPolicy,
    bus: StatusBus,
}

impl Coordinator {
    pub fn new(
        frames: FramePipeline,
        transcription: TranscriptionPipeline,
        config: &AppConfig,
    ) -> Self {
        Self {
            frames,
            transcription,
            alignment: AlignmentEngine::new(config.segmentation.window_secs),
            retry: config.retry.clone(),
            policy: config.policy,
            bus: StatusBus::new(config.events.capacity),
        }
    }

    /// Wire the HTTP service clients described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let frames = FramePipeline::new(
            Arc::new(HttpFrameService::from_config(&config.frames)),
            config.pricing.clone(),
            config.segmentation.window_secs,
        );
        let transcription = TranscriptionPipeline::new(
            Arc::new(HttpSpeechService::from_config(&config.speech)),
            Arc::new(WindowSegmenter::new(config.segmentation.window_secs)),
            config,
        );
        Self::new(frames, transcription, config)
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn policy(&self) -> DependencyPolicy {
        self.policy
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Run both pipelines concurrently until each is terminal, then align.
    pub async fn run(&self, submission: &Arc<Submission>) -> SubmissionSnapshot {
        let id = submission.id();
        log::info!(
            "coordinator: [{id}] starting {} ({:.1}s)",
            submission.source().url,
            submission.source().duration()
        );

        self.set_frames(submission, PipelineStatus::Running { progress: 0 });
        self.set_transcription(submission, PipelineStatus::Running { progress: 0 });

        let frames = {
            let this = self.clone();
            let sub = Arc::clone(submission);
            tokio::spawn(async move { this.run_frames(&sub).await })
        };
        let transcription = {
            let this = self.clone();
            let sub = Arc::clone(submission);
            tokio::spawn(async move { this.run_transcription(&sub).await })
        };

        let (frames, transcription) = tokio::join!(frames, transcription);
        if let Err(e) = frames {
            log::error!("coordinator: [{id}] frames task died: {e}");
            self.set_frames(
                submission,
                PipelineStatus::Failed(PipelineError::new(ErrorKind::Internal, e.to_string())),
            );
        }
        if let Err(e) = transcription {
            log::error!("coordinator: [{id}] transcription task died: {e}");
            self.set_transcription(
                submission,
                PipelineStatus::Failed(PipelineError::new(ErrorKind::Internal, e.to_string())),
            );
        }

        self.align_if_ready(submission);
        let snapshot = submission.snapshot();
        log::info!(
            "coordinator: [{id}] finished as {:?}, cost {}",
            snapshot.phase,
            snapshot.cost.display_total()
        );
        snapshot
    }

    // -----------------------------------------------------------------------
    // Manual retries
    // -----------------------------------------------------------------------

    /// Re-run one failed pipeline.  The other pipeline is left untouched.
    pub async fn retry_pipeline(
        &self,
        submission: &Submission,
        kind: PipelineKind,
    ) -> Result<SubmissionSnapshot, RetryError> {
        let view = submission.status_view(kind);
        if view.error_kind == Some(ErrorKind::Cancelled) {
            return Err(RetryError::Cancelled(kind));
        }
        if !submission.is_retryable(kind) {
            return Err(RetryError::NotFailed {
                kind,
                phase: view.phase,
            });
        }

        log::info!("coordinator: [{}] manual retry of {kind}", submission.id());
        submission.clear_alignment();
        match kind {
            PipelineKind::Frames => {
                self.set_frames(submission, PipelineStatus::Running { progress: 0 });
                self.run_frames(submission).await;
            }
            PipelineKind::Transcription => {
                self.set_transcription(submission, PipelineStatus::Running { progress: 0 });
                self.run_transcription(submission).await;
            }
        }
        self.align_if_ready(submission);
        Ok(submission.snapshot())
    }

    /// Re-run segmentation from the retained transcript.  The speech
    /// service is not called again.
    pub fn retry_segmentation(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionSnapshot, RetryError> {
        let output = match submission.transcription_status() {
            PipelineStatus::Succeeded(output) if output.segmented.error().is_some() => output,
            _ => return Err(RetryError::SegmentationNotFailed),
        };

        log::info!("coordinator: [{}] retrying segmentation", submission.id());
        let segmented = self
            .transcription
            .segment(&output.transcript, submission.source().duration());
        submission.set_segmented(segmented);
        self.publish(submission, PipelineKind::Transcription);

        self.align_if_ready(submission);
        Ok(submission.snapshot())
    }

    // -----------------------------------------------------------------------
    // Pipeline tasks
    // -----------------------------------------------------------------------

    async fn run_frames(&self, sub: &Submission) {
        let id = sub.id();
        let progress = |p: u8| self.set_frames(sub, PipelineStatus::Running { progress: p });
        let token = sub.cancel_token(PipelineKind::Frames);

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::cancelled()),
            r = self.frames.run(sub.source(), sub.resolver(), sub.ledger(), &progress) => r,
        };

        match result {
            Ok(samples) => {
                log::info!("coordinator: [{id}] frames done, {} samples", samples.len());
                self.set_frames(sub, PipelineStatus::Succeeded(samples));
            }
            Err(e) => {
                log::error!("coordinator: [{id}] frames failed: {e}");
                self.set_frames(sub, PipelineStatus::Failed(e));
            }
        }
    }

    async fn run_transcription(&self, sub: &Submission) {
        let id = sub.id();
        let token = sub.cancel_token(PipelineKind::Transcription);

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::cancelled()),
            r = self.transcription_loop(sub) => r,
        };

        match result {
            Ok(output) => {
                log::info!(
                    "coordinator: [{id}] transcription done{}",
                    if output.is_degraded() { " (raw video)" } else { "" }
                );
                self.set_transcription(sub, PipelineStatus::Succeeded(output));
            }
            Err(e) => {
                log::error!("coordinator: [{id}] transcription failed: {e}");
                self.set_transcription(sub, PipelineStatus::Failed(e));
            }
        }
    }

    /// Attempt transcription once per retry interval until the adapter
    /// stops waiting.
    async fn transcription_loop(&self, sub: &Submission) -> Result<TranscriptOutput, PipelineError> {
        let id = sub.id();
        let progress = |p: u8| self.set_transcription(sub, PipelineStatus::Running { progress: p });

        loop {
            // Error before handle: a failed frame run never publishes later.
            let frame_failure = sub
                .frames_error()
                .filter(|_| sub.resolver().asset_handle().is_none());

            let allow_raw = match (frame_failure, self.policy) {
                (None, _) => false,
                (Some(_), DependencyPolicy::Degrade) => true,
                (Some(err), DependencyPolicy::Block) => {
                    return Err(PipelineError::new(
                        ErrorKind::DependencyFailed,
                        format!("frame pipeline failed: {}", err.message),
                    ))
                }
            };

            let outcome = self
                .transcription
                .attempt(sub.source(), sub.resolver(), sub.ledger(), allow_raw, &progress)
                .await?;

            match outcome {
                TranscriptionOutcome::Complete(output) => return Ok(output),
                TranscriptionOutcome::Waiting(info) => {
                    log::info!(
                        "coordinator: [{id}] transcription waiting ({}), retrying in {:?}",
                        info.reason,
                        self.retry.interval()
                    );
                    self.set_transcription(sub, PipelineStatus::WaitingOnDependency(info));
                    tokio::time::sleep(self.retry.interval()).await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn align_if_ready(&self, sub: &Submission) -> bool {
        let Some((frames, segments)) = sub.alignment_inputs() else {
            return false;
        };
        let report = self
            .alignment
            .align(sub.source().duration(), &frames, &segments);
        log::info!(
            "coordinator: [{}] aligned {} of {} units, accuracy {:.3}",
            sub.id(),
            report.result.produced_units,
            report.result.expected_units,
            report.result.accuracy
        );
        sub.set_alignment(report);
        true
    }

    fn set_frames(&self, sub: &Submission, status: PipelineStatus<Vec<FrameSample>>) {
        log::debug!("coordinator: [{}] frames -> {:?}", sub.id(), status.phase());
        let view = sub.set_frames(status);
        self.emit(sub, PipelineKind::Frames, view);
    }

    fn set_transcription(&self, sub: &Submission, status: PipelineStatus<TranscriptOutput>) {
        log::debug!(
            "coordinator: [{}] transcription -> {:?}",
            sub.id(),
            status.phase()
        );
        let view = sub.set_transcription(status);
        self.emit(sub, PipelineKind::Transcription, view);
    }

    fn publish(&self, sub: &Submission, kind: PipelineKind) {
        self.emit(sub, kind, sub.status_view(kind));
    }

    fn emit(&self, sub: &Submission, kind: PipelineKind, status: StatusView) {
        let segmentation = match kind {
            PipelineKind::Frames => None,
            PipelineKind::Transcription => sub.segmentation_view(),
        };
        self.bus.publish(StatusEvent {
            submission_id: sub.id(),
            pipeline: kind,
            status,
            segmentation,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
