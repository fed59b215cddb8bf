//! Client for the external frame service.
//!
//! The frame service ingests a video, mints an [`AssetHandle`] for it, and
//! renders thumbnails of the ingested asset at requested timestamps.
//!
//! [`MockFrameService`] (available under `#[cfg(test)]`) replaces the HTTP
//! client in pipeline and coordinator tests.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::FrameServiceConfig;
use crate::error::{ensure_success, ServiceError};
use crate::resolver::AssetHandle;
use crate::source::VideoSource;

// ---------------------------------------------------------------------------
// FrameService trait
// ---------------------------------------------------------------------------

/// A thumbnail as returned by the frame service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Thumbnail {
    pub timestamp: u32,
    pub url: String,
}

/// Async interface to the frame service.
///
/// Implementors must be `Send + Sync` so one client can be shared by many
/// submissions behind an `Arc<dyn FrameService>`.
#[async_trait]
pub trait FrameService: Send + Sync {
    /// Ingest the video and return the handle of the new asset.
    async fn ingest(&self, source: &VideoSource) -> Result<AssetHandle, ServiceError>;

    /// Render one thumbnail per requested timestamp.  The service may return
    /// fewer thumbnails than requested.
    async fn thumbnails(
        &self,
        handle: &AssetHandle,
        timestamps: &[u32],
    ) -> Result<Vec<Thumbnail>, ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpFrameService
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IngestResponse {
    asset_handle: String,
}

#[derive(Deserialize)]
struct ThumbnailsResponse {
    thumbnails: Vec<Thumbnail>,
}

/// JSON-over-HTTP frame service client.
///
/// * `POST {base_url}/v1/assets` with `{"input": <video url>}`
/// * `POST {base_url}/v1/assets/{handle}/thumbnails` with `{"timestamps": [...]}`
pub struct HttpFrameService {
    client: reqwest::Client,
    config: FrameServiceConfig,
}

impl HttpFrameService {
    pub fn from_config(config: &FrameServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let req = self.client.post(url);
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }
}

#[async_trait]
impl FrameService for HttpFrameService {
    async fn ingest(&self, source: &VideoSource) -> Result<AssetHandle, ServiceError> {
        let body = serde_json::json!({ "input": source.url });
        let response = self.post("/v1/assets").json(&body).send().await?;
        let parsed: IngestResponse = ensure_success(response).await?.json().await?;

        if parsed.asset_handle.trim().is_empty() {
            return Err(ServiceError::Parse("empty asset_handle".into()));
        }
        Ok(AssetHandle::new(parsed.asset_handle))
    }

    async fn thumbnails(
        &self,
        handle: &AssetHandle,
        timestamps: &[u32],
    ) -> Result<Vec<Thumbnail>, ServiceError> {
        let path = format!("/v1/assets/{handle}/thumbnails");
        let body = serde_json::json!({ "timestamps": timestamps });
        let response = self.post(&path).json(&body).send().await?;
        let parsed: ThumbnailsResponse = ensure_success(response).await?.json().await?;
        Ok(parsed.thumbnails)
    }
}

// ---------------------------------------------------------------------------
// MockFrameService  (test-only)
// ---------------------------------------------------------------------------

/// Scriptable stand-in for the frame service.
///
/// Queued failures are consumed one per call, so `failing_ingest(e)` fails
/// the first ingest and lets a retry through.
#[cfg(test)]
pub struct MockFrameService {
    handle: String,
    ingest_delay: std::time::Duration,
    ingest_failures: std::sync::Mutex<Vec<ServiceError>>,
    thumbnail_failures: std::sync::Mutex<Vec<ServiceError>>,
    omitted: Vec<u32>,
    ingest_calls: std::sync::atomic::AtomicUsize,
    thumbnail_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockFrameService {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ingest_delay: std::time::Duration::ZERO,
            ingest_failures: Default::default(),
            thumbnail_failures: Default::default(),
            omitted: Vec::new(),
            ingest_calls: Default::default(),
            thumbnail_calls: Default::default(),
        }
    }

    /// Ingest completes only after `delay` (tokio time, so paused clocks work).
    pub fn with_ingest_delay(mut self, delay: std::time::Duration) -> Self {
        self.ingest_delay = delay;
        self
    }

    pub fn failing_ingest(self, err: ServiceError) -> Self {
        self.ingest_failures.lock().unwrap().push(err);
        self
    }

    pub fn failing_thumbnails(self, err: ServiceError) -> Self {
        self.thumbnail_failures.lock().unwrap().push(err);
        self
    }

    /// Leave these timestamps out of every thumbnails response.
    pub fn omitting(mut self, timestamps: &[u32]) -> Self {
        self.omitted = timestamps.to_vec();
        self
    }

    pub fn ingest_calls(&self) -> usize {
        self.ingest_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn thumbnail_calls(&self) -> usize {
        self.thumbnail_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl FrameService for MockFrameService {
    async fn ingest(&self, _source: &VideoSource) -> Result<AssetHandle, ServiceError> {
        self.ingest_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.ingest_delay.is_zero() {
            tokio::time::sleep(self.ingest_delay).await;
        }
        let failure = {
            let mut queue = self.ingest_failures.lock().unwrap();
            (!queue.is_empty()).then(|| queue.remove(0))
        };
        match failure {
            Some(err) => Err(err),
            None => Ok(AssetHandle::new(self.handle.clone())),
        }
    }

    async fn thumbnails(
        &self,
        handle: &AssetHandle,
        timestamps: &[u32],
    ) -> Result<Vec<Thumbnail>, ServiceError> {
        self.thumbnail_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let failure = {
            let mut queue = self.thumbnail_failures.lock().unwrap();
            (!queue.is_empty()).then(|| queue.remove(0))
        };
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(timestamps
            .iter()
            .filter(|ts| !self.omitted.contains(ts))
            .map(|&timestamp| Thumbnail {
                timestamp,
                url: format!("https://frames.test/{handle}/{timestamp}.jpg"),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
