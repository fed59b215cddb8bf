//! Input of the downstream multimodal analysis call.
//!
//! The analysis service itself lives elsewhere; this crate only produces
//! the finalized bundle it consumes.  Built by
//! [`Submission::handoff`](crate::pipeline::Submission::handoff) once the
//! submission is aligned.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::align::{AlignedUnit, ValidationReport};
use crate::pipeline::ledger::CostSnapshot;
use crate::resolver::AssetHandle;

/// Facts about the source video the analysis prompt needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub submission_id: Uuid,
    pub video_url: String,
    pub duration_secs: f64,
    pub asset_handle: Option<AssetHandle>,
    pub language: String,
    /// Full transcript text, also present when segmentation was retried.
    pub transcript: String,
    /// Transcription used the raw video because frames failed.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisHandoff {
    pub metadata: VideoMetadata,
    pub units: Vec<AlignedUnit>,
    pub validation: ValidationReport,
    pub cost: CostSnapshot,
}

impl AnalysisHandoff {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
