//! The Submission aggregate.
//!
//! A [`Submission`] owns everything one upload needs: the source reference,
//! its own [`DependencyResolver`] and [`CostLedger`], both pipeline statuses
//! and the alignment once computed.  Only the coordinator mutates it (the
//! setters are crate-private); everyone else reads [`SubmissionSnapshot`]s.
//!
//! Lock the inner state for short critical sections only and never across
//! an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::align::AlignmentReport;
use crate::analysis::{AnalysisHandoff, VideoMetadata};
use crate::error::PipelineError;
use crate::frames::FrameSample;
use crate::pipeline::ledger::{CostLedger, CostSnapshot};
use crate::pipeline::status::{Phase, PipelineKind, PipelineStatus, StatusView};
use crate::resolver::DependencyResolver;
use crate::source::VideoSource;
use crate::transcription::{TranscriptOutput, TranscriptSegment};

// ---------------------------------------------------------------------------
// SubmissionPhase
// ---------------------------------------------------------------------------

/// Roll-up of both pipelines into one label for the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    /// Nothing has run yet.
    Created,
    /// At least one pipeline is still moving.
    Processing,
    /// Both pipelines succeeded but the segmented view failed; retry
    /// segmentation to continue.
    SegmentationFailed,
    /// Frames failed, transcription succeeded from the raw video.
    Degraded,
    Aligned,
    Failed,
    Cancelled,
}

impl SubmissionPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubmissionPhase::Created | SubmissionPhase::Processing)
    }
}

// ---------------------------------------------------------------------------
// SubmissionState
// ---------------------------------------------------------------------------

/// Mutable part of a submission, guarded by the submission's mutex.
#[derive(Debug, Default)]
pub struct SubmissionState {
    pub frames: PipelineStatus<Vec<FrameSample>>,
    pub transcription: PipelineStatus<TranscriptOutput>,
    /// Phase changes of the frame pipeline, oldest first.
    pub frame_history: Vec<Phase>,
    /// Phase changes of the transcription pipeline.  Every wait is
    /// recorded, including consecutive ones.
    pub transcription_history: Vec<Phase>,
    pub alignment: Option<AlignmentReport>,
    /// Number of attempts that found the dependency missing.
    pub wait_attempts: u32,
}

fn push_phase(history: &mut Vec<Phase>, phase: Phase) {
    if phase == Phase::WaitingOnDependency || history.last() != Some(&phase) {
        history.push(phase);
    }
}

impl SubmissionState {
    fn segmentation(&self) -> Option<&PipelineStatus<Vec<TranscriptSegment>>> {
        self.transcription.succeeded().map(|out| &out.segmented)
    }

    fn phase(&self, cancelled: bool) -> SubmissionPhase {
        if self.alignment.is_some() {
            return SubmissionPhase::Aligned;
        }
        if cancelled {
            return SubmissionPhase::Cancelled;
        }
        let (frames, transcription) = (&self.frames, &self.transcription);
        if matches!(frames, PipelineStatus::Idle) && matches!(transcription, PipelineStatus::Idle) {
            return SubmissionPhase::Created;
        }
        if !frames.is_terminal() || !transcription.is_terminal() {
            return SubmissionPhase::Processing;
        }
        match (frames, transcription) {
            (PipelineStatus::Succeeded(_), PipelineStatus::Succeeded(out)) => {
                if out.segmented.error().is_some() {
                    SubmissionPhase::SegmentationFailed
                } else {
                    // Alignment is recorded right after this state is reached.
                    SubmissionPhase::Processing
                }
            }
            (PipelineStatus::Failed(_), PipelineStatus::Succeeded(_)) => SubmissionPhase::Degraded,
            _ => SubmissionPhase::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// SubmissionSnapshot
// ---------------------------------------------------------------------------

/// Read-only copy of a submission handed to callers and the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSnapshot {
    pub id: Uuid,
    pub phase: SubmissionPhase,
    pub frames: StatusView,
    pub transcription: StatusView,
    /// Present once the speech call has succeeded.
    pub segmentation: Option<StatusView>,
    /// Thumbnails available so far, for display while transcription waits.
    pub frame_samples: Vec<FrameSample>,
    /// Full transcript text, present even when segmentation failed.
    pub transcript: Option<String>,
    pub alignment: Option<AlignmentReport>,
    pub wait_attempts: u32,
    pub cost: CostSnapshot,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One upload and everything derived from it.
pub struct Submission {
    id: Uuid,
    source: VideoSource,
    resolver: DependencyResolver,
    ledger: CostLedger,
    state: Mutex<SubmissionState>,
    cancel: CancellationToken,
    frames_cancel: CancellationToken,
    transcription_cancel: CancellationToken,
}

impl Submission {
    pub fn new(source: VideoSource) -> Self {
        let cancel = CancellationToken::new();
        Self {
            id: Uuid::new_v4(),
            source,
            resolver: DependencyResolver::new(),
            ledger: CostLedger::new(),
            state: Mutex::new(SubmissionState::default()),
            frames_cancel: cancel.child_token(),
            transcription_cancel: cancel.child_token(),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Abandon the whole submission.  Both pipelines end as cancelled
    /// failures and their retry timers are dropped.
    pub fn cancel(&self) {
        log::info!("submission: [{}] cancelled", self.id);
        self.cancel.cancel();
    }

    /// Cancel one pipeline, leaving the other running.
    pub fn cancel_pipeline(&self, kind: PipelineKind) {
        log::info!("submission: [{}] {kind} cancelled", self.id);
        self.cancel_token(kind).cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self, kind: PipelineKind) -> &CancellationToken {
        match kind {
            PipelineKind::Frames => &self.frames_cancel,
            PipelineKind::Transcription => &self.transcription_cancel,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn frames_status(&self) -> PipelineStatus<Vec<FrameSample>> {
        self.lock().frames.clone()
    }

    pub fn transcription_status(&self) -> PipelineStatus<TranscriptOutput> {
        self.lock().transcription.clone()
    }

    pub fn status_view(&self, kind: PipelineKind) -> StatusView {
        let st = self.lock();
        match kind {
            PipelineKind::Frames => st.frames.view(),
            PipelineKind::Transcription => st.transcription.view(),
        }
    }

    /// Sub-status of segmentation; `None` until transcription succeeded.
    pub fn segmentation_view(&self) -> Option<StatusView> {
        self.lock().segmentation().map(PipelineStatus::view)
    }

    pub fn is_retryable(&self, kind: PipelineKind) -> bool {
        let st = self.lock();
        match kind {
            PipelineKind::Frames => st.frames.is_retryable(),
            PipelineKind::Transcription => st.transcription.is_retryable(),
        }
    }

    /// Terminal failure of the frame pipeline, if any.
    pub fn frames_error(&self) -> Option<PipelineError> {
        self.lock().frames.error().cloned()
    }

    pub fn history(&self, kind: PipelineKind) -> Vec<Phase> {
        let st = self.lock();
        match kind {
            PipelineKind::Frames => st.frame_history.clone(),
            PipelineKind::Transcription => st.transcription_history.clone(),
        }
    }

    pub fn alignment(&self) -> Option<AlignmentReport> {
        self.lock().alignment.clone()
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.lock().phase(self.is_cancelled())
    }

    pub fn snapshot(&self) -> SubmissionSnapshot {
        let cost = self.ledger.snapshot();
        let st = self.lock();
        SubmissionSnapshot {
            id: self.id,
            phase: st.phase(self.is_cancelled()),
            frames: st.frames.view(),
            transcription: st.transcription.view(),
            segmentation: st.segmentation().map(PipelineStatus::view),
            frame_samples: st.frames.succeeded().cloned().unwrap_or_default(),
            transcript: st
                .transcription
                .succeeded()
                .map(|out| out.transcript.text.clone()),
            alignment: st.alignment.clone(),
            wait_attempts: st.wait_attempts,
            cost,
        }
    }

    /// The bundle for the downstream analysis call.  `None` until aligned.
    pub fn handoff(&self) -> Option<AnalysisHandoff> {
        let cost = self.ledger.snapshot();
        let st = self.lock();
        let report = st.alignment.as_ref()?;
        let output = st.transcription.succeeded()?;
        Some(AnalysisHandoff {
            metadata: VideoMetadata {
                submission_id: self.id,
                video_url: self.source.url.clone(),
                duration_secs: self.source.duration(),
                asset_handle: self.resolver.asset_handle(),
                language: output.transcript.language.clone(),
                transcript: output.transcript.text.clone(),
                degraded: output.is_degraded(),
            },
            units: report.result.units.clone(),
            validation: report.validation.clone(),
            cost,
        })
    }

    // -----------------------------------------------------------------------
    // Writes (coordinator only)
    // -----------------------------------------------------------------------

    pub(crate) fn set_frames(&self, status: PipelineStatus<Vec<FrameSample>>) -> StatusView {
        let mut st = self.lock();
        push_phase(&mut st.frame_history, status.phase());
        st.frames = status;
        st.frames.view()
    }

    pub(crate) fn set_transcription(&self, status: PipelineStatus<TranscriptOutput>) -> StatusView {
        let mut st = self.lock();
        if matches!(status, PipelineStatus::WaitingOnDependency(_)) {
            st.wait_attempts += 1;
        }
        push_phase(&mut st.transcription_history, status.phase());
        st.transcription = status;
        st.transcription.view()
    }

    /// Replace the segmented view of a succeeded transcription.  Returns
    /// `false` when there is no transcript to attach it to.
    pub(crate) fn set_segmented(&self, status: PipelineStatus<Vec<TranscriptSegment>>) -> bool {
        let mut st = self.lock();
        match &mut st.transcription {
            PipelineStatus::Succeeded(output) => {
                output.segmented = status;
                true
            }
            _ => false,
        }
    }

    /// Both succeeded payloads, when alignment is possible.
    pub(crate) fn alignment_inputs(&self) -> Option<(Vec<FrameSample>, Vec<TranscriptSegment>)> {
        let st = self.lock();
        let frames = st.frames.succeeded()?.clone();
        let segments = st.transcription.succeeded()?.segments()?.to_vec();
        Some((frames, segments))
    }

    pub(crate) fn set_alignment(&self, report: AlignmentReport) {
        self.lock().alignment = Some(report);
    }

    /// Drop a stale alignment before a pipeline is re-run.
    pub(crate) fn clear_alignment(&self) {
        self.lock().alignment = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::status::WaitInfo;
    use crate::transcription::{AudioSource, RawTranscript};

    fn submission() -> Submission {
        Submission::new(VideoSource::new("https://blob/v.mp4", 30.0))
    }

    fn waiting() -> PipelineStatus<TranscriptOutput> {
        PipelineStatus::WaitingOnDependency(WaitInfo {
            reason: "pending".into(),
            estimated_wait_secs: 10,
        })
    }

    fn output(segmented: PipelineStatus<Vec<TranscriptSegment>>) -> TranscriptOutput {
        TranscriptOutput {
            transcript: RawTranscript {
                text: "hello".into(),
                language: "en".into(),
                duration_secs: None,
                spans: Vec::new(),
            },
            audio: AudioSource::Raw { url: "u".into() },
            segmented,
        }
    }

    #[test]
    fn new_submission_is_created_and_idle() {
        let sub = submission();
        assert_eq!(sub.phase(), SubmissionPhase::Created);
        assert_eq!(sub.frames_status(), PipelineStatus::Idle);
        assert!(sub.handoff().is_none());
    }

    #[test]
    fn history_records_every_wait_but_collapses_other_repeats() {
        let sub = submission();
        sub.set_transcription(PipelineStatus::Running { progress: 0 });
        sub.set_transcription(waiting());
        sub.set_transcription(waiting());
        sub.set_transcription(PipelineStatus::Running { progress: 10 });
        sub.set_transcription(PipelineStatus::Running { progress: 80 });

        assert_eq!(
            sub.history(PipelineKind::Transcription),
            vec![
                Phase::Running,
                Phase::WaitingOnDependency,
                Phase::WaitingOnDependency,
                Phase::Running
            ]
        );
        assert_eq!(sub.snapshot().wait_attempts, 2);
    }

    #[test]
    fn segmentation_failure_is_its_own_phase() {
        let sub = submission();
        sub.set_frames(PipelineStatus::Succeeded(Vec::new()));
        sub.set_transcription(PipelineStatus::Succeeded(output(PipelineStatus::Failed(
            PipelineError::new(ErrorKind::Segmentation, "bad span"),
        ))));

        let snap = sub.snapshot();
        assert_eq!(snap.phase, SubmissionPhase::SegmentationFailed);
        assert_eq!(snap.transcript.as_deref(), Some("hello"));
        assert!(snap.segmentation.unwrap().is_error());
        assert!(!snap.transcription.is_error());
        assert!(sub.alignment_inputs().is_none());
    }

    #[test]
    fn frame_failure_with_transcript_is_degraded() {
        let sub = submission();
        sub.set_frames(PipelineStatus::Failed(PipelineError::new(
            ErrorKind::UnsupportedFormat,
            "flv",
        )));
        sub.set_transcription(PipelineStatus::Succeeded(output(PipelineStatus::Succeeded(
            Vec::new(),
        ))));
        assert_eq!(sub.phase(), SubmissionPhase::Degraded);
        assert!(sub.phase().is_terminal());
    }

    #[test]
    fn set_segmented_needs_a_transcript() {
        let sub = submission();
        assert!(!sub.set_segmented(PipelineStatus::Succeeded(Vec::new())));
    }

    #[test]
    fn cancel_reaches_both_pipeline_tokens() {
        let sub = submission();
        sub.cancel();
        assert!(sub.cancel_token(PipelineKind::Frames).is_cancelled());
        assert!(sub.cancel_token(PipelineKind::Transcription).is_cancelled());
        assert_eq!(sub.phase(), SubmissionPhase::Cancelled);
    }

    #[test]
    fn cancel_pipeline_leaves_the_other_alone() {
        let sub = submission();
        sub.cancel_pipeline(PipelineKind::Frames);
        assert!(sub.cancel_token(PipelineKind::Frames).is_cancelled());
        assert!(!sub.cancel_token(PipelineKind::Transcription).is_cancelled());
        assert!(!sub.is_cancelled());
    }
}
