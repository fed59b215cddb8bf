//! Transcription pipeline adapter.
//!
//! # Architecture
//!
//! ```text
//!             ┌─────────────────────────────┐
//! attempt() ─▶│ resolver.asset_handle()?     │── None ──▶ Waiting (no paid call)
//!             └──────────────┬──────────────┘
//!                            │ Some(handle) / raw fallback
//!                            ▼
//!               SpeechService::transcribe   ──▶ RawTranscript (kept)
//!                            │
//!                            ▼
//!               Segmenter::segment          ──▶ Vec<TranscriptSegment>
//!                                               or Failed(Segmentation)
//! ```
//!
//! Segmentation is retryable on its own from the retained transcript; see
//! [`TranscriptionPipeline::segment`].

pub mod adapter;
pub mod segment;
pub mod service;
pub mod srt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use adapter::{
    TranscriptOutput, TranscriptionOutcome, TranscriptionPipeline, SPEECH_SERVICE, WAITING_REASON,
};
pub use segment::{SegmentationError, Segmenter, TranscriptSegment, WindowSegmenter};
pub use service::{AudioSource, HttpSpeechService, RawTranscript, SpeechService, SpeechSpan};
pub use srt::to_srt;

#[cfg(test)]
pub use segment::FlakySegmenter;
#[cfg(test)]
pub use service::MockSpeechService;
