//! Merge of the frame series and the segment series.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PipelineError};
use crate::frames::sample::window_ends;
use crate::frames::{expected_windows, FrameSample};
use crate::transcription::TranscriptSegment;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A frame and the segment ending at the frame's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedUnit {
    pub timestamp: u32,
    pub frame: FrameSample,
    pub segment: TranscriptSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A frame exists but no segment ends at its timestamp.
    MissingTranscript,
    /// A segment exists but no frame was sampled at its end.
    MissingFrame,
    /// An expected slot produced neither.
    MissingBoth,
    /// A second frame carries an already used timestamp.
    DuplicateFrame,
    /// A second segment ends at an already used end time.
    DuplicateSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentGap {
    pub timestamp: u32,
    pub kind: GapKind,
}

impl AlignmentGap {
    /// Gaps are reported, never raised; this is the reporting shape.
    pub fn to_error(self) -> PipelineError {
        let what = match self.kind {
            GapKind::MissingTranscript => "no transcript segment",
            GapKind::MissingFrame => "no frame",
            GapKind::MissingBoth => "neither frame nor transcript segment",
            GapKind::DuplicateFrame => "duplicate frame",
            GapKind::DuplicateSegment => "duplicate transcript segment",
        };
        PipelineError::new(
            ErrorKind::AlignmentGap,
            format!("{what} at {}s", self.timestamp),
        )
    }
}

/// Fully matched units plus the headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub units: Vec<AlignedUnit>,
    pub expected_units: usize,
    pub produced_units: usize,
    /// `produced / expected`, in `[0, 1]`; 1.0 when nothing was expected.
    pub accuracy: f64,
}

/// Every mismatch found while aligning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub gaps: Vec<AlignmentGap>,
    pub accuracy: f64,
    pub expected_frames: usize,
    pub expected_segments: usize,
    pub is_complete: bool,
}

impl ValidationReport {
    pub fn issues(&self) -> Vec<PipelineError> {
        self.gaps.iter().map(|g| g.to_error()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub result: AlignmentResult,
    pub validation: ValidationReport,
}

// ---------------------------------------------------------------------------
// AlignmentEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct AlignmentEngine {
    window_secs: u32,
}

impl AlignmentEngine {
    pub fn new(window_secs: u32) -> Self {
        Self { window_secs }
    }

    /// Pair frames with segments by `frame.timestamp == segment.end_time`.
    ///
    /// The denominator of the accuracy is the largest of the expected count
    /// and the two series lengths, so extra items can never push accuracy
    /// above 1.0.
    pub fn align(
        &self,
        duration_secs: f64,
        frames: &[FrameSample],
        segments: &[TranscriptSegment],
    ) -> AlignmentReport {
        let expected = expected_windows(duration_secs, self.window_secs);

        let mut units = Vec::new();
        let mut gaps = Vec::new();

        let mut by_end: BTreeMap<u32, &TranscriptSegment> = BTreeMap::new();
        for seg in segments {
            if by_end.contains_key(&seg.end_time) {
                gaps.push(AlignmentGap {
                    timestamp: seg.end_time,
                    kind: GapKind::DuplicateSegment,
                });
            } else {
                by_end.insert(seg.end_time, seg);
            }
        }

        let mut ordered: Vec<&FrameSample> = frames.iter().collect();
        ordered.sort_by_key(|f| f.timestamp);

        let mut seen: BTreeSet<u32> = BTreeSet::new();
        for frame in ordered {
            if !seen.insert(frame.timestamp) {
                gaps.push(AlignmentGap {
                    timestamp: frame.timestamp,
                    kind: GapKind::DuplicateFrame,
                });
                continue;
            }
            match by_end.remove(&frame.timestamp) {
                Some(segment) => units.push(AlignedUnit {
                    timestamp: frame.timestamp,
                    frame: frame.clone(),
                    segment: segment.clone(),
                }),
                None => gaps.push(AlignmentGap {
                    timestamp: frame.timestamp,
                    kind: GapKind::MissingTranscript,
                }),
            }
        }

        for &end in by_end.keys() {
            seen.insert(end);
            gaps.push(AlignmentGap {
                timestamp: end,
                kind: GapKind::MissingFrame,
            });
        }

        for ts in window_ends(duration_secs, self.window_secs) {
            if !seen.contains(&ts) {
                gaps.push(AlignmentGap {
                    timestamp: ts,
                    kind: GapKind::MissingBoth,
                });
            }
        }
        gaps.sort_by_key(|g| g.timestamp);

        let denominator = expected.max(frames.len()).max(segments.len());
        let accuracy = if denominator == 0 {
            1.0
        } else {
            units.len() as f64 / denominator as f64
        };

        if !gaps.is_empty() {
            log::warn!(
                "align: {} gaps, accuracy {:.3} ({} of {})",
                gaps.len(),
                accuracy,
                units.len(),
                denominator
            );
        }

        let produced = units.len();
        AlignmentReport {
            result: AlignmentResult {
                units,
                expected_units: expected,
                produced_units: produced,
                accuracy,
            },
            validation: ValidationReport {
                is_complete: gaps.is_empty() && produced == denominator,
                gaps,
                accuracy,
                expected_frames: expected,
                expected_segments: expected,
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
    use crate::frames::sample_timestamps;

    fn frames(ts: &[u32]) -> Vec<FrameSample> {
        ts.iter()
            .map(|&t| FrameSample::new(t, format!("https://img/{t}.jpg")))
            .collect()
    }

    fn segments(ends: &[u32]) -> Vec<TranscriptSegment> {
        ends.iter()
            .map(|&end| TranscriptSegment {
                start_time: end - 5,
                end_time: end,
                text: format!("text {end}"),
                confidence: 1.0,
            })
            .collect()
    }

    #[test]
    fn thirty_seconds_aligns_fully() {
        let ts = sample_timestamps(30.0, 5);
        let report = AlignmentEngine::new(5).align(30.0, &frames(&ts), &segments(&ts));

        assert_eq!(report.result.units.len(), 6);
        assert_eq!(report.result.expected_units, 6);
        assert_eq!(report.result.accuracy, 1.0);
        assert!(report.validation.gaps.is_empty());
        assert!(report.validation.is_complete);
        for unit in &report.result.units {
            assert_eq!(unit.frame.timestamp, unit.segment.end_time);
        }
    }

    #[test]
    fn full_series_are_always_accurate() {
        for tenths in (0..1_500u32).step_by(7) {
            let d = f64::from(tenths) / 10.0;
            let ts = sample_timestamps(d, 5);
            let report = AlignmentEngine::new(5).align(d, &frames(&ts), &segments(&ts));
            assert_eq!(report.result.accuracy, 1.0, "duration {d}");
        }
    }

    #[test]
    fn missing_segment_is_reported_not_dropped() {
        let report =
            AlignmentEngine::new(5).align(15.0, &frames(&[5, 10, 15]), &segments(&[5, 15]));

        assert_eq!(report.result.produced_units, 2);
        assert_eq!(
            report.validation.gaps,
            vec![AlignmentGap {
                timestamp: 10,
                kind: GapKind::MissingTranscript
            }]
        );
        assert!((report.result.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!(!report.validation.is_complete);
    }

    #[test]
    fn missing_frame_is_reported() {
        let report =
            AlignmentEngine::new(5).align(15.0, &frames(&[5, 15]), &segments(&[5, 10, 15]));
        assert_eq!(report.validation.gaps[0].kind, GapKind::MissingFrame);
        assert_eq!(report.validation.gaps[0].timestamp, 10);
    }

    #[test]
    fn slot_missing_from_both_series_is_reported() {
        let report = AlignmentEngine::new(5).align(15.0, &frames(&[5, 15]), &segments(&[5, 15]));
        assert_eq!(
            report.validation.gaps,
            vec![AlignmentGap {
                timestamp: 10,
                kind: GapKind::MissingBoth
            }]
        );
    }

    #[test]
    fn duplicate_segment_end_is_reported() {
        let mut segs = segments(&[5, 5, 10]);
        segs[1].text = "duplicate".into();
        let report = AlignmentEngine::new(5).align(10.0, &frames(&[5, 10]), &segs);

        assert_eq!(report.result.produced_units, 2);
        assert_eq!(report.result.units[0].segment.text, "text 5");
        assert_eq!(
            report.validation.gaps,
            vec![AlignmentGap {
                timestamp: 5,
                kind: GapKind::DuplicateSegment
            }]
        );
        assert!((report.result.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!(!report.validation.is_complete);
    }

    #[test]
    fn duplicate_frame_is_reported_as_duplicate() {
        let report =
            AlignmentEngine::new(5).align(10.0, &frames(&[5, 10, 5]), &segments(&[5, 10]));

        assert_eq!(report.result.produced_units, 2);
        assert_eq!(
            report.validation.gaps,
            vec![AlignmentGap {
                timestamp: 5,
                kind: GapKind::DuplicateFrame
            }]
        );
        assert!(!report.validation.is_complete);
        assert!(report.validation.issues()[0].message.contains("duplicate frame"));
    }

    #[test]
    fn incomplete_whenever_accuracy_is_below_one() {
        let cases: [(&[u32], &[u32]); 4] = [
            (&[5, 10], &[5, 5, 10]),
            (&[5, 5, 10], &[5, 10]),
            (&[5, 10, 15], &[5, 10]),
            (&[5, 10], &[5, 10]),
        ];
        for (f, s) in cases {
            let report = AlignmentEngine::new(5).align(10.0, &frames(f), &segments(s));
            assert_eq!(
                report.validation.is_complete,
                report.result.accuracy == 1.0,
                "frames {f:?} segments {s:?}"
            );
            assert_eq!(report.validation.is_complete, report.validation.gaps.is_empty());
        }
    }

    #[test]
    fn units_are_ordered_even_if_frames_are_not() {
        let report =
            AlignmentEngine::new(5).align(15.0, &frames(&[15, 5, 10]), &segments(&[5, 10, 15]));
        let ts: Vec<u32> = report.result.units.iter().map(|u| u.timestamp).collect();
        assert_eq!(ts, vec![5, 10, 15]);
    }

    #[test]
    fn short_video_has_perfect_empty_alignment() {
        let report = AlignmentEngine::new(5).align(3.0, &[], &[]);
        assert!(report.result.units.is_empty());
        assert_eq!(report.result.accuracy, 1.0);
        assert!(report.validation.is_complete);
    }

    #[test]
    fn gaps_render_as_alignment_gap_errors() {
        let report = AlignmentEngine::new(5).align(10.0, &frames(&[5, 10]), &segments(&[5]));
        let issues = report.validation.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ErrorKind::AlignmentGap);
        assert!(issues[0].message.contains("10s"));
    }
}
