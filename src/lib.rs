//! Video ingest orchestration for pitch analysis.
//!
//! An uploaded video runs through two concurrent pipelines: frame sampling
//! on an external frame service and transcription on an external speech
//! service.  Transcription depends on the asset handle minted by the frame
//! service; until it is published the transcription pipeline reports a
//! waiting status and is retried on a fixed cadence.  Once both succeed the
//! frame series and the transcript windows are aligned into a single
//! time-ordered dataset for the downstream analysis call.
//!
//! | Module            | Responsibility                                   |
//! |-------------------|--------------------------------------------------|
//! | [`config`]        | TOML settings and platform paths                 |
//! | [`error`]         | Error taxonomy                                   |
//! | [`resolver`]      | Write-once cross-pipeline dependency store       |
//! | [`frames`]        | Frame service client and frame pipeline          |
//! | [`transcription`] | Speech client, segmentation, SRT export          |
//! | [`align`]         | Frame/segment alignment and validation           |
//! | [`pipeline`]      | Submission state, coordinator, ledger, events    |
//! | [`analysis`]      | Handoff bundle for the analysis call             |

pub mod align;
pub mod analysis;
pub mod config;
pub mod error;
pub mod frames;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod transcription;
