//! Frame sample types and the sampling grid.
//!
//! Frames are anchored at the END of each window: with a 5 s window the
//! grid is `5, 10, …, floor(D/5)*5`, so every frame shares its timestamp
//! with the end of exactly one transcript segment.

use serde::{Deserialize, Serialize};

/// One thumbnail taken from the video at a whole-second timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Seconds from the start of the video.
    pub timestamp: u32,
    /// Dereferenceable image URL.
    pub image_url: String,
    /// File name encoding the timestamp, e.g. `frame_0015s.jpg`.
    pub filename: String,
}

impl FrameSample {
    pub fn new(timestamp: u32, image_url: impl Into<String>) -> Self {
        Self {
            timestamp,
            image_url: image_url.into(),
            filename: frame_filename(timestamp),
        }
    }
}

pub fn frame_filename(timestamp: u32) -> String {
    format!("frame_{timestamp:04}s.jpg")
}

/// Number of complete `window_secs` windows in `duration_secs`.
///
/// This is the expected count of both frames and transcript segments.  The
/// count is capped so that the end of the last window still fits a `u32`
/// timestamp.
pub fn expected_windows(duration_secs: f64, window_secs: u32) -> usize {
    if window_secs == 0 || !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    let max_windows = u32::MAX / window_secs;
    let windows = (duration_secs / f64::from(window_secs)).floor();
    if windows >= f64::from(max_windows) {
        max_windows as usize
    } else {
        windows as usize
    }
}

/// End timestamp of every complete window, in order.
pub(crate) fn window_ends(duration_secs: f64, window_secs: u32) -> impl Iterator<Item = u32> {
    let count = u32::try_from(expected_windows(duration_secs, window_secs)).unwrap_or(0);
    (1..=count).map_while(move |i| i.checked_mul(window_secs))
}

/// Timestamps at which frames must be sampled, strictly increasing.
///
/// ```
/// use pitch_analyzer::frames::sample_timestamps;
///
/// assert_eq!(sample_timestamps(30.0, 5), vec![5, 10, 15, 20, 25, 30]);
/// assert_eq!(sample_timestamps(12.9, 5), vec![5, 10]);
/// assert!(sample_timestamps(4.9, 5).is_empty());
/// ```
pub fn sample_timestamps(duration_secs: f64, window_secs: u32) -> Vec<u32> {
    window_ends(duration_secs, window_secs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_seconds_gives_six_frames() {
        let ts = sample_timestamps(30.0, 5);
        assert_eq!(ts.len(), 6);
        assert_eq!(ts.first(), Some(&5));
        assert_eq!(ts.last(), Some(&30));
    }

    #[test]
    fn fractional_duration_floors() {
        let ts = sample_timestamps(147.5, 5);
        assert_eq!(ts.len(), 29);
        assert_eq!(ts.last(), Some(&145));
    }

    #[test]
    fn absurd_durations_stay_within_timestamp_range() {
        assert_eq!(expected_windows(1e12, 5), (u32::MAX / 5) as usize);
        assert_eq!(expected_windows(f64::MAX, 7), (u32::MAX / 7) as usize);

        let wide = 1 << 20;
        let ends: Vec<u32> = window_ends(1e12, wide).collect();
        assert_eq!(ends.len(), (u32::MAX / wide) as usize);
        assert_eq!(ends.last(), Some(&((u32::MAX / wide) * wide)));
    }

    #[test]
    fn expected_count_matches_floor_for_many_durations() {
        for tenths in 0..2_000u32 {
            let d = f64::from(tenths) / 10.0;
            let expected = (d / 5.0).floor() as usize;
            assert_eq!(expected_windows(d, 5), expected, "duration {d}");
            assert_eq!(sample_timestamps(d, 5).len(), expected, "duration {d}");
        }
    }

    #[test]
    fn timestamps_strictly_increase_by_window() {
        let ts = sample_timestamps(100.0, 5);
        for pair in ts.windows(2) {
            assert_eq!(pair[1] - pair[0], 5);
        }
    }

    #[test]
    fn degenerate_inputs_are_empty() {
        assert!(sample_timestamps(0.0, 5).is_empty());
        assert!(sample_timestamps(-10.0, 5).is_empty());
        assert!(sample_timestamps(f64::NAN, 5).is_empty());
        assert!(sample_timestamps(30.0, 0).is_empty());
    }

    #[test]
    fn filename_encodes_timestamp() {
        let f = FrameSample::new(15, "https://img/15.jpg");
        assert_eq!(f.filename, "frame_0015s.jpg");
        assert_eq!(frame_filename(120), "frame_0120s.jpg");
    }
}
