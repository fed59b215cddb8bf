//! Alignment engine.
//!
//! Runs once both pipelines have succeeded.  Produces the ordered list of
//! [`AlignedUnit`]s (fully matched only) and a [`ValidationReport`] that
//! enumerates every gap, so a mismatch is never silently dropped.

pub mod engine;

pub use engine::{
    AlignedUnit, AlignmentEngine, AlignmentGap, AlignmentReport, AlignmentResult, GapKind,
    ValidationReport,
};
