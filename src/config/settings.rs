//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// DependencyPolicy
// ---------------------------------------------------------------------------

/// What the transcription pipeline does once the frame pipeline has
/// terminally failed and the asset handle will never be published.
///
/// | Variant | Behaviour                                                   |
/// |---------|-------------------------------------------------------------|
/// | Degrade | Transcribe from the raw video reference instead            |
/// | Block   | Fail transcription with `DependencyFailed`                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyPolicy {
    Degrade,
    Block,
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        Self::Degrade
    }
}

// ---------------------------------------------------------------------------
// FrameServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the external frame-thumbnail service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameServiceConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
    /// Bearer token; `None` for unauthenticated local mocks.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FrameServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8600".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the external speech-to-text service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechServiceConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
    /// Bearer token; `None` for unauthenticated local mocks.
    pub api_key: Option<String>,
    /// Model identifier sent with every request (e.g. `"whisper-1"`).
    pub model: String,
    /// ISO-639-1 language hint, or `"auto"`.
    pub language: String,
    /// Per-request timeout in seconds.  Transcription of long videos is
    /// slow, so this is much larger than the frame service's.
    pub timeout_secs: u64,
    /// Template that turns an asset handle into an audio-addressable URL.
    /// `{handle}` is replaced with the handle verbatim.
    pub audio_url_template: String,
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8700".into(),
            api_key: None,
            model: "whisper-1".into(),
            language: "auto".into(),
            timeout_secs: 300,
            audio_url_template: "https://stream.mux.com/{handle}/audio.m4a".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentationConfig
// ---------------------------------------------------------------------------

/// Settings for re-chunking a full transcript into fixed windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Window width in seconds; also the frame sampling interval.
    pub window_secs: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { window_secs: 5 }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// Cadence of the dependency-wait loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Fixed delay between two transcription attempts while waiting.
    pub interval_ms: u64,
    /// Heuristic reported to the caller as the remaining wait.
    pub estimated_wait_secs: u32,
}

impl RetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            estimated_wait_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// PricingConfig
// ---------------------------------------------------------------------------

/// Prices in USD used to fill the cost ledger.  One entry is recorded per
/// external call actually made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat price of ingesting one video into the frame service.
    pub frame_ingest_usd: f64,
    /// Price per generated thumbnail.
    pub frame_thumbnail_usd: f64,
    /// Speech-to-text price per started audio minute.
    pub speech_usd_per_minute: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            frame_ingest_usd: 0.015,
            frame_thumbnail_usd: 0.0005,
            speech_usd_per_minute: 0.006,
        }
    }
}

// ---------------------------------------------------------------------------
// EventsConfig
// ---------------------------------------------------------------------------

/// Status event channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer capacity; slow subscribers lag past this.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pitch_analyzer::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Behaviour when the frame pipeline fails.
    pub policy: DependencyPolicy,
    /// Frame-thumbnail service connection.
    pub frames: FrameServiceConfig,
    /// Speech-to-text service connection.
    pub speech: SpeechServiceConfig,
    /// Transcript window settings.
    pub segmentation: SegmentationConfig,
    /// Dependency-wait retry cadence.
    pub retry: RetryConfig,
    /// Per-call prices for the cost ledger.
    pub pricing: PricingConfig,
    /// Status event channel.
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
