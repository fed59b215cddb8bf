//! Fixed-window segmentation of a full transcript.
//!
//! Windows are `[0, w), [w, 2w), …` for every complete window of the
//! duration.  Each timed span lands in the window containing its midpoint;
//! spans whose midpoint falls in the trailing partial window (or past the
//! end) are folded into the last full window.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, PipelineError};
use crate::frames::expected_windows;
use crate::transcription::service::{RawTranscript, SpeechSpan};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One fixed-width slice of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Window start in whole seconds.
    pub start_time: u32,
    /// `start_time + window`; equals the timestamp of the matching frame.
    pub end_time: u32,
    /// Possibly empty.
    pub text: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    #[error("window width must be positive")]
    InvalidWindow,

    #[error("invalid duration {0}")]
    InvalidDuration(f64),

    #[error("span {index} has malformed boundaries ({start}..{end})")]
    MalformedSpan { index: usize, start: f64, end: f64 },

    #[error("span {index} starts at {start}s, past the {duration}s duration")]
    SpanOutOfRange {
        index: usize,
        start: f64,
        duration: f64,
    },
}

impl From<SegmentationError> for PipelineError {
    fn from(e: SegmentationError) -> Self {
        PipelineError::new(ErrorKind::Segmentation, e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Segmenter
// ---------------------------------------------------------------------------

/// Re-chunks a full transcript into contiguous fixed-width segments.
pub trait Segmenter: Send + Sync {
    fn segment(
        &self,
        transcript: &RawTranscript,
        duration_secs: f64,
    ) -> Result<Vec<TranscriptSegment>, SegmentationError>;
}

/// Midpoint-assignment segmenter over `window_secs` windows.
#[derive(Debug, Clone, Copy)]
pub struct WindowSegmenter {
    window_secs: u32,
}

impl WindowSegmenter {
    pub fn new(window_secs: u32) -> Self {
        Self { window_secs }
    }

    fn validate(
        spans: &[SpeechSpan],
        duration_secs: f64,
    ) -> Result<(), SegmentationError> {
        for (index, span) in spans.iter().enumerate() {
            let malformed = !span.start.is_finite()
                || !span.end.is_finite()
                || span.start < 0.0
                || span.end < span.start;
            if malformed {
                return Err(SegmentationError::MalformedSpan {
                    index,
                    start: span.start,
                    end: span.end,
                });
            }
            if span.start > duration_secs {
                return Err(SegmentationError::SpanOutOfRange {
                    index,
                    start: span.start,
                    duration: duration_secs,
                });
            }
        }
        Ok(())
    }

    fn from_spans(&self, spans: &[SpeechSpan], windows: usize) -> Vec<(Vec<String>, Vec<f32>)> {
        let mut buckets: Vec<(Vec<String>, Vec<f32>)> = vec![(Vec::new(), Vec::new()); windows];
        let width = f64::from(self.window_secs);
        for span in spans {
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            let midpoint = (span.start + span.end) / 2.0;
            let index = ((midpoint / width).floor() as usize).min(windows - 1);
            buckets[index].0.push(text.to_string());
            buckets[index]
                .1
                .push(span.confidence.unwrap_or(1.0).clamp(0.0, 1.0));
        }
        buckets
    }

    fn from_words(text: &str, windows: usize) -> Vec<(Vec<String>, Vec<f32>)> {
        let words: Vec<&str> = text.split_whitespace().collect();
        (0..windows)
            .map(|i| {
                let lo = i * words.len() / windows;
                let hi = (i + 1) * words.len() / windows;
                let chunk: Vec<String> = words[lo..hi].iter().map(|w| w.to_string()).collect();
                let confidences = if chunk.is_empty() { Vec::new() } else { vec![1.0] };
                (chunk, confidences)
            })
            .collect()
    }
}

impl Segmenter for WindowSegmenter {
    fn segment(
        &self,
        transcript: &RawTranscript,
        duration_secs: f64,
    ) -> Result<Vec<TranscriptSegment>, SegmentationError> {
        if self.window_secs == 0 {
            return Err(SegmentationError::InvalidWindow);
        }
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(SegmentationError::InvalidDuration(duration_secs));
        }
        Self::validate(&transcript.spans, duration_secs)?;

        let windows = expected_windows(duration_secs, self.window_secs);
        if windows == 0 {
            return Ok(Vec::new());
        }

        let buckets = if transcript.spans.is_empty() {
            Self::from_words(&transcript.text, windows)
        } else {
            self.from_spans(&transcript.spans, windows)
        };

        Ok(buckets
            .into_iter()
            .enumerate()
            .map(|(i, (texts, confidences))| {
                let start_time = i as u32 * self.window_secs;
                let confidence = if confidences.is_empty() {
                    0.0
                } else {
                    confidences.iter().sum::<f32>() / confidences.len() as f32
                };
                TranscriptSegment {
                    start_time,
                    end_time: start_time + self.window_secs,
                    text: texts.join(" "),
                    confidence,
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FlakySegmenter  (test-only)
// ---------------------------------------------------------------------------

/// Fails the first `failures` calls with a malformed-span error, then
/// delegates to a [`WindowSegmenter`].
#[cfg(test)]
pub struct FlakySegmenter {
    inner: WindowSegmenter,
    remaining_failures: std::sync::atomic::AtomicUsize,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FlakySegmenter {
    pub fn new(window_secs: u32, failures: usize) -> Self {
        Self {
            inner: WindowSegmenter::new(window_secs),
            remaining_failures: failures.into(),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Segmenter for FlakySegmenter {
    fn segment(
        &self,
        transcript: &RawTranscript,
        duration_secs: f64,
    ) -> Result<Vec<TranscriptSegment>, SegmentationError> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SegmentationError::MalformedSpan {
                index: 0,
                start: 3.0,
                end: 1.0,
            });
        }
        self.inner.segment(transcript, duration_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
