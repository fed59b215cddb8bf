//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each external
//! service and for the orchestration loop, `AppPaths` for cross-platform
//! directories, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, DependencyPolicy, EventsConfig, FrameServiceConfig, PricingConfig, RetryConfig,
    SegmentationConfig, SpeechServiceConfig,
};
