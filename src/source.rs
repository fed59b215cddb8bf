//! The uploaded video a submission is built around.

use serde::{Deserialize, Serialize};

/// Dereferenceable reference to the uploaded video plus its probed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    /// Blob-storage URL of the upload.
    pub url: String,
    /// Source duration in seconds.
    pub duration_secs: f64,
}

impl VideoSource {
    pub fn new(url: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            url: url.into(),
            duration_secs,
        }
    }

    /// Duration clamped to a finite, non-negative value.
    pub fn duration(&self) -> f64 {
        if self.duration_secs.is_finite() {
            self.duration_secs.max(0.0)
        } else {
            0.0
        }
    }
}
