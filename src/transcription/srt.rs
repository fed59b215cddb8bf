//! SubRip (`.srt`) rendering of transcript segments.

use std::fmt::Write;

use crate::transcription::segment::TranscriptSegment;

/// `HH:MM:SS,mmm` for a whole-second offset.
fn srt_time(secs: u32) -> String {
    format!(
        "{:02}:{:02}:{:02},000",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Numbered SRT blocks, one per segment, separated by a blank line.
pub fn to_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_time(seg.start_time),
            srt_time(seg.end_time),
            seg.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: u32, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_time: start,
            end_time: start + 5,
            text: text.into(),
            confidence: 1.0,
        }
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(srt_time(0), "00:00:00,000");
        assert_eq!(srt_time(65), "00:01:05,000");
        assert_eq!(srt_time(3_725), "01:02:05,000");
    }

    #[test]
    fn renders_numbered_blocks() {
        let srt = to_srt(&[seg(0, "hello"), seg(5, "")]);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:05,000\nhello\n\n2\n00:00:05,000 --> 00:00:10,000\n\n\n"
        );
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(to_srt(&[]).is_empty());
    }
}
