//! Client for the external speech-to-text service.
//!
//! [`MockSpeechService`] (available under `#[cfg(test)]`) records every call
//! so tests can assert that nothing was billed while waiting on a
//! dependency.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SpeechServiceConfig;
use crate::error::{ensure_success, ServiceError};
use crate::resolver::AssetHandle;

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// What the speech service is asked to transcribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AudioSource {
    /// Audio stream of the ingested asset.  Preferred.
    Asset { handle: AssetHandle, url: String },
    /// The uploaded video itself, used when frames failed and the policy
    /// allows degrading.
    Raw { url: String },
}

impl AudioSource {
    /// Build the asset audio URL by substituting `{handle}` in `template`.
    pub fn from_handle(handle: AssetHandle, template: &str) -> Self {
        let url = template.replace("{handle}", handle.as_str());
        AudioSource::Asset { handle, url }
    }

    pub fn url(&self) -> &str {
        match self {
            AudioSource::Asset { url, .. } | AudioSource::Raw { url } => url,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AudioSource::Raw { .. })
    }
}

// ---------------------------------------------------------------------------
// RawTranscript
// ---------------------------------------------------------------------------

/// One timed stretch of speech as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSpan {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// The full, unsegmented transcript.  Kept even when segmentation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    pub language: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub spans: Vec<SpeechSpan>,
}

// ---------------------------------------------------------------------------
// SpeechService trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn transcribe(&self, audio: &AudioSource) -> Result<RawTranscript, ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpSpeechService
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct VerboseResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

/// Calls `POST {base_url}/v1/transcriptions` and expects a verbose JSON
/// body with the full text plus timed segments.
///
/// The `Authorization: Bearer …` header is attached only when
/// `config.api_key` is a non-empty string.
pub struct HttpSpeechService {
    client: reqwest::Client,
    config: SpeechServiceConfig,
}

impl HttpSpeechService {
    pub fn from_config(config: &SpeechServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn transcribe(&self, audio: &AudioSource) -> Result<RawTranscript, ServiceError> {
        let url = format!(
            "{}/v1/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "audio_url":       audio.url(),
            "model":           self.config.model,
            "language":        self.config.language,
            "response_format": "verbose_json"
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = ensure_success(req.send().await?).await?;
        let parsed: VerboseResponse = response.json().await?;

        Ok(RawTranscript {
            text: parsed.text.trim().to_string(),
            language: parsed
                .language
                .unwrap_or_else(|| self.config.language.clone()),
            duration_secs: parsed.duration,
            spans: parsed
                .segments
                .into_iter()
                .map(|s| SpeechSpan {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                    confidence: s.confidence,
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockSpeechService  (test-only)
// ---------------------------------------------------------------------------

/// Returns a canned transcript and records every call.
#[cfg(test)]
pub struct MockSpeechService {
    transcript: RawTranscript,
    failures: std::sync::Mutex<Vec<ServiceError>>,
    calls: std::sync::Mutex<Vec<AudioSource>>,
}

#[cfg(test)]
impl MockSpeechService {
    pub fn new(transcript: RawTranscript) -> Self {
        Self {
            transcript,
            failures: Default::default(),
            calls: Default::default(),
        }
    }

    /// One five-second span per full window of `duration_secs`, each
    /// saying "window N".
    pub fn covering(duration_secs: f64) -> Self {
        let windows = (duration_secs / 5.0).floor() as usize;
        let spans: Vec<SpeechSpan> = (0..windows)
            .map(|i| SpeechSpan {
                start: i as f64 * 5.0,
                end: i as f64 * 5.0 + 5.0,
                text: format!("window {i}"),
                confidence: Some(0.9),
            })
            .collect();
        let text = spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(RawTranscript {
            text,
            language: "en".into(),
            duration_secs: Some(duration_secs),
            spans,
        })
    }

    pub fn failing(self, err: ServiceError) -> Self {
        self.failures.lock().unwrap().push(err);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<AudioSource> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SpeechService for MockSpeechService {
    async fn transcribe(&self, audio: &AudioSource) -> Result<RawTranscript, ServiceError> {
        self.calls.lock().unwrap().push(audio.clone());
        let failure = {
            let mut queue = self.failures.lock().unwrap();
            (!queue.is_empty()).then(|| queue.remove(0))
        };
        match failure {
            Some(err) => Err(err),
            None => Ok(self.transcript.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_substituted_into_template() {
        let audio = AudioSource::from_handle(
            AssetHandle::new("abc123"),
            "https://stream.test/{handle}/audio.m4a",
        );
        assert_eq!(audio.url(), "https://stream.test/abc123/audio.m4a");
        assert!(!audio.is_degraded());
    }

    #[test]
    fn raw_source_is_degraded() {
        let audio = AudioSource::Raw {
            url: "https://blob/v.mp4".into(),
        };
        assert!(audio.is_degraded());
        assert_eq!(audio.url(), "https://blob/v.mp4");
    }

    #[test]
    fn verbose_response_parses_with_missing_optionals() {
        let json = r#"{"text":" hello world ","segments":[{"start":0.0,"end":2.5,"text":"hello world"}]}"#;
        let parsed: VerboseResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.language.is_none());
        assert_eq!(parsed.segments.len(), 1);
        assert!(parsed.segments[0].confidence.is_none());
    }

    #[test]
    fn from_config_builds() {
        let service = HttpSpeechService::from_config(&SpeechServiceConfig::default());
        let boxed: Box<dyn SpeechService> = Box::new(service);
        drop(boxed);
    }

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockSpeechService::covering(10.0);
        let audio = AudioSource::Raw { url: "u".into() };
        let transcript = mock.transcribe(&audio).await.unwrap();
        assert_eq!(transcript.spans.len(), 2);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0], audio);
    }
}
