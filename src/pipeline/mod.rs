//! Submission orchestration.
//!
//! This module owns the per-pipeline status machine, the Submission
//! aggregate, the cost ledger, the status event bus and the coordinator
//! that drives both pipelines.
//!
//! # Architecture
//!
//! ```text
//! Coordinator::run(Arc<Submission>)
//!        │
//!        ├─ tokio::spawn ── FramePipeline ──────────┐ register handle
//!        │                                          ▼
//!        ├─ tokio::spawn ── TranscriptionPipeline ◀─ DependencyResolver
//!        │                   └─ Waiting ─▶ sleep(interval) ─▶ retry
//!        │
//!        └─ both terminal ─▶ AlignmentEngine ─▶ Submission.alignment
//!
//! every transition ─▶ Submission (state)  +  StatusBus (broadcast)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pitch_analyzer::config::AppConfig;
//! use pitch_analyzer::pipeline::{Coordinator, Submission};
//! use pitch_analyzer::source::VideoSource;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let coordinator = Coordinator::from_config(&config);
//!
//!     let mut events = coordinator.bus().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{} {:?}", event.pipeline, event.status.phase);
//!         }
//!     });
//!
//!     let submission = Arc::new(Submission::new(VideoSource::new(
//!         "https://blob.test/pitch.mp4",
//!         147.5,
//!     )));
//!     let snapshot = coordinator.run(&submission).await;
//!     println!("{:?} {}", snapshot.phase, snapshot.cost.display_total());
//! }
//! ```

pub mod coordinator;
pub mod events;
pub mod ledger;
pub mod state;
pub mod status;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::{Coordinator, RetryError};
pub use events::{StatusBus, StatusEvent};
pub use ledger::{CostEntry, CostLedger, CostSnapshot};
pub use state::{Submission, SubmissionPhase, SubmissionSnapshot, SubmissionState};
pub use status::{
    Phase, PipelineKind, PipelineStatus, StatusEnvelope, StatusView, WaitInfo,
};
