//! Transcription pipeline: dependency gate, paid speech call, segmentation.
//!
//! One [`attempt`](TranscriptionPipeline::attempt) either reports that the
//! asset handle is not published yet (an `Ok` outcome, not an error) or
//! runs the speech service exactly once.  Segmentation runs afterwards as
//! a separate sub-phase whose failure leaves the full transcript intact.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{AppConfig, PricingConfig};
use crate::error::PipelineError;
use crate::pipeline::ledger::CostLedger;
use crate::pipeline::status::{PipelineStatus, WaitInfo};
use crate::resolver::DependencyResolver;
use crate::source::VideoSource;
use crate::transcription::segment::{Segmenter, TranscriptSegment};
use crate::transcription::service::{AudioSource, RawTranscript, SpeechService};

/// Ledger label for speech service charges.
pub const SPEECH_SERVICE: &str = "speech-service";

/// Reason shown to the user while the asset handle is pending.
pub const WAITING_REASON: &str = "Audio extraction in progress";

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Result of a completed speech call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptOutput {
    /// Always retained, even when segmentation failed.
    pub transcript: RawTranscript,
    /// Where the audio came from.
    pub audio: AudioSource,
    /// Segmented view; `Failed` with a segmentation error is retryable on
    /// its own.
    #[serde(skip)]
    pub segmented: PipelineStatus<Vec<TranscriptSegment>>,
}

impl TranscriptOutput {
    pub fn segments(&self) -> Option<&[TranscriptSegment]> {
        self.segmented.succeeded().map(Vec::as_slice)
    }

    /// `true` when the raw video reference was transcribed instead of the
    /// asset audio.
    pub fn is_degraded(&self) -> bool {
        self.audio.is_degraded()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionOutcome {
    /// The asset handle is not available yet; nothing was billed.
    Waiting(WaitInfo),
    Complete(TranscriptOutput),
}

// ---------------------------------------------------------------------------
// TranscriptionPipeline
// ---------------------------------------------------------------------------

/// Cheap to clone; shared between the coordinator and its spawned tasks.
#[derive(Clone)]
pub struct TranscriptionPipeline {
    service: Arc<dyn SpeechService>,
    segmenter: Arc<dyn Segmenter>,
    pricing: PricingConfig,
    audio_url_template: String,
    estimated_wait_secs: u32,
}

impl TranscriptionPipeline {
    pub fn new(
        service: Arc<dyn SpeechService>,
        segmenter: Arc<dyn Segmenter>,
        config: &AppConfig,
    ) -> Self {
        Self {
            service,
            segmenter,
            pricing: config.pricing.clone(),
            audio_url_template: config.speech.audio_url_template.clone(),
            estimated_wait_secs: config.retry.estimated_wait_secs,
        }
    }

    /// Run one attempt.
    ///
    /// The resolver is always consulted first.  Without a handle the
    /// attempt returns [`TranscriptionOutcome::Waiting`] immediately unless
    /// `allow_raw` is set, in which case the raw video URL is transcribed.
    pub async fn attempt(
        &self,
        source: &VideoSource,
        resolver: &DependencyResolver,
        ledger: &CostLedger,
        allow_raw: bool,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<TranscriptionOutcome, PipelineError> {
        let audio = match resolver.asset_handle() {
            Some(handle) => AudioSource::from_handle(handle, &self.audio_url_template),
            None if allow_raw => AudioSource::Raw {
                url: source.url.clone(),
            },
            None => {
                return Ok(TranscriptionOutcome::Waiting(WaitInfo {
                    reason: WAITING_REASON.to_string(),
                    estimated_wait_secs: self.estimated_wait_secs,
                }))
            }
        };
        if audio.is_degraded() {
            log::warn!("transcription: no asset handle, transcribing raw video");
        }
        progress(10);

        let transcript = self.service.transcribe(&audio).await?;
        let billed_secs = transcript.duration_secs.unwrap_or_else(|| source.duration());
        let minutes = (billed_secs / 60.0).ceil().max(1.0);
        ledger.record(
            SPEECH_SERVICE,
            format!("transcribe {minutes:.0} min"),
            minutes * self.pricing.speech_usd_per_minute,
        );
        log::info!(
            "transcription: {} chars ({})",
            transcript.text.chars().count(),
            transcript.language
        );
        progress(80);

        let segmented = self.segment(&transcript, source.duration());
        progress(100);

        Ok(TranscriptionOutcome::Complete(TranscriptOutput {
            transcript,
            audio,
            segmented,
        }))
    }

    /// Segment a retained transcript.  No external calls.
    pub fn segment(
        &self,
        transcript: &RawTranscript,
        duration_secs: f64,
    ) -> PipelineStatus<Vec<TranscriptSegment>> {
        match self.segmenter.segment(transcript, duration_secs) {
            Ok(segments) => PipelineStatus::Succeeded(segments),
            Err(e) => {
                log::warn!("transcription: segmentation failed: {e}");
                PipelineStatus::Failed(e.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ServiceError};
    use crate::resolver::AssetHandle;
    use crate::transcription::segment::{FlakySegmenter, WindowSegmenter};
    use crate::transcription::service::MockSpeechService;

    fn no_progress(_: u8) {}

    fn pipeline(speech: Arc<MockSpeechService>, segmenter: Arc<dyn Segmenter>) -> TranscriptionPipeline {
        TranscriptionPipeline::new(speech, segmenter, &AppConfig::default())
    }

    fn complete(outcome: TranscriptionOutcome) -> TranscriptOutput {
        match outcome {
            TranscriptionOutcome::Complete(output) => output,
            TranscriptionOutcome::Waiting(info) => panic!("still waiting: {}", info.reason),
        }
    }

    #[tokio::test]
    async fn waits_without_calling_service_when_handle_absent() {
        let speech = Arc::new(MockSpeechService::covering(30.0));
        let ledger = CostLedger::new();
        let p = pipeline(speech.clone(), Arc::new(WindowSegmenter::new(5)));

        let outcome = p
            .attempt(
                &VideoSource::new("u", 30.0),
                &DependencyResolver::new(),
                &ledger,
                false,
                &no_progress,
            )
            .await
            .unwrap();

        match outcome {
            TranscriptionOutcome::Waiting(info) => {
                assert_eq!(info.reason, WAITING_REASON);
                assert_eq!(info.estimated_wait_secs, 10);
            }
            other => panic!("expected waiting, got {other:?}"),
        }
        assert_eq!(speech.call_count(), 0);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn uses_asset_audio_when_handle_published() {
        let speech = Arc::new(MockSpeechService::covering(30.0));
        let resolver = DependencyResolver::new();
        resolver.register_handle(&AssetHandle::new("asset-9")).unwrap();
        let ledger = CostLedger::new();

        let output = complete(
            pipeline(speech.clone(), Arc::new(WindowSegmenter::new(5)))
                .attempt(&VideoSource::new("u", 30.0), &resolver, &ledger, false, &no_progress)
                .await
                .unwrap(),
        );

        assert!(!output.is_degraded());
        assert!(speech.calls()[0].url().contains("asset-9"));
        assert_eq!(output.segments().map(<[_]>::len), Some(6));
        assert_eq!(ledger.len(), 1);
        assert!((ledger.total_usd() - 0.006).abs() < 1e-12);
    }

    #[tokio::test]
    async fn degrades_to_raw_reference_when_allowed() {
        let speech = Arc::new(MockSpeechService::covering(10.0));
        let output = complete(
            pipeline(speech.clone(), Arc::new(WindowSegmenter::new(5)))
                .attempt(
                    &VideoSource::new("https://blob/v.mp4", 10.0),
                    &DependencyResolver::new(),
                    &CostLedger::new(),
                    true,
                    &no_progress,
                )
                .await
                .unwrap(),
        );
        assert!(output.is_degraded());
        assert_eq!(speech.calls()[0].url(), "https://blob/v.mp4");
    }

    #[tokio::test]
    async fn service_error_is_terminal_and_unbilled() {
        let speech = Arc::new(MockSpeechService::covering(10.0).failing(ServiceError::QuotaExceeded(
            "monthly limit".into(),
        )));
        let resolver = DependencyResolver::new();
        resolver.register_handle(&AssetHandle::new("a")).unwrap();
        let ledger = CostLedger::new();

        let err = pipeline(speech, Arc::new(WindowSegmenter::new(5)))
            .attempt(&VideoSource::new("u", 10.0), &resolver, &ledger, false, &no_progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn segmentation_failure_keeps_full_transcript() {
        let speech = Arc::new(MockSpeechService::covering(20.0));
        let segmenter = Arc::new(FlakySegmenter::new(5, 1));
        let resolver = DependencyResolver::new();
        resolver.register_handle(&AssetHandle::new("a")).unwrap();
        let p = pipeline(speech.clone(), segmenter.clone());

        let output = complete(
            p.attempt(&VideoSource::new("u", 20.0), &resolver, &CostLedger::new(), false, &no_progress)
                .await
                .unwrap(),
        );

        assert!(!output.transcript.text.is_empty());
        assert_eq!(
            output.segmented.error().map(|e| e.kind),
            Some(ErrorKind::Segmentation)
        );

        let retried = p.segment(&output.transcript, 20.0);
        assert_eq!(retried.succeeded().map(Vec::len), Some(4));
        assert_eq!(speech.call_count(), 1);
        assert_eq!(segmenter.calls(), 2);
    }

    #[tokio::test]
    async fn long_audio_is_billed_per_started_minute() {
        let speech = Arc::new(MockSpeechService::covering(147.5));
        let resolver = DependencyResolver::new();
        resolver.register_handle(&AssetHandle::new("a")).unwrap();
        let ledger = CostLedger::new();

        pipeline(speech, Arc::new(WindowSegmenter::new(5)))
            .attempt(&VideoSource::new("u", 147.5), &resolver, &ledger, false, &no_progress)
            .await
            .unwrap();

        assert!((ledger.total_usd() - 3.0 * 0.006).abs() < 1e-12);
    }
}
