//! Frame pipeline adapter.
//!
//! # Architecture
//!
//! ```text
//! VideoSource ──▶ FrameService::ingest ──▶ AssetHandle ──▶ DependencyResolver
//!                                              │
//!                                              ▼
//!                         FrameService::thumbnails(5, 10, …)
//!                                              │
//!                                              ▼
//!                                     Vec<FrameSample>
//! ```
//!
//! The handle is published as soon as ingest succeeds, before thumbnails are
//! rendered, so the transcription pipeline is unblocked early.

pub mod adapter;
pub mod sample;
pub mod service;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use adapter::{FramePipeline, FRAME_SERVICE};
pub use sample::{expected_windows, frame_filename, sample_timestamps, FrameSample};
pub use service::{FrameService, HttpFrameService, Thumbnail};

#[cfg(test)]
pub use service::MockFrameService;
