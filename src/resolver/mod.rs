//! Cross-pipeline dependency resolver.
//!
//! [`DependencyResolver`] is the only state shared between the frame and
//! transcription pipelines of a submission.  The frame pipeline publishes
//! the [`AssetHandle`] exactly once; the transcription pipeline checks for
//! it without blocking.
//!
//! ```text
//! FramePipeline ── register(ASSET_HANDLE_KEY) ──▶ ┌──────────────────┐
//!                                                 │ DependencyResolver│
//! TranscriptionPipeline ── check() (non-blocking) ▶└──────────────────┘
//! ```
//!
//! Values are stored whole under a mutex, so a reader never observes a
//! partially written handle.  Each submission constructs its own resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

/// Key under which the frame pipeline publishes the asset handle.
pub const ASSET_HANDLE_KEY: &str = "asset_handle";

// ---------------------------------------------------------------------------
// AssetHandle
// ---------------------------------------------------------------------------

/// Opaque identifier minted by the frame service once it has ingested a
/// video.  Only equality and presence are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ResolverError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// A key was registered a second time with a different value.  This is
    /// a programming error in the caller.
    #[error("dependency '{key}' already registered as '{existing}', refusing '{attempted}'")]
    Conflict {
        key: String,
        existing: String,
        attempted: String,
    },

    /// [`DependencyResolver::wait_for`] gave up.
    #[error("dependency '{key}' not available after {waited:?}")]
    Timeout { key: String, waited: Duration },
}

// ---------------------------------------------------------------------------
// DependencyResolver
// ---------------------------------------------------------------------------

/// Write-once key/value store with a non-blocking check and an explicit
/// bounded wait.
#[derive(Default)]
pub struct DependencyResolver {
    entries: Mutex<HashMap<String, String>>,
    published: Notify,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`.
    ///
    /// Registering the same value again is a no-op.  A different value for
    /// an existing key fails with [`ResolverError::Conflict`] and leaves the
    /// stored value untouched.
    pub fn register(&self, key: &str, value: impl Into<String>) -> Result<(), ResolverError> {
        let value = value.into();
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(existing) if *existing == value => return Ok(()),
                Some(existing) => {
                    return Err(ResolverError::Conflict {
                        key: key.to_string(),
                        existing: existing.clone(),
                        attempted: value,
                    })
                }
                None => {
                    entries.insert(key.to_string(), value);
                }
            }
        }
        log::debug!("resolver: '{key}' published");
        self.published.notify_waiters();
        Ok(())
    }

    /// Non-blocking lookup.
    pub fn check(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Suspend until `key` is registered or `timeout` elapses.
    ///
    /// Only for callers that can afford to park; the transcription pipeline
    /// uses [`check`](Self::check) and lets the coordinator retry instead.
    pub async fn wait_for(&self, key: &str, timeout: Duration) -> Result<String, ResolverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            // Subscribe before checking so a publish in between is not lost.
            notified.as_mut().enable();

            if let Some(value) = self.check(key) {
                return Ok(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(ResolverError::Timeout {
                    key: key.to_string(),
                    waited: timeout,
                });
            }
        }
    }

    /// Publish the asset handle for this submission.
    pub fn register_handle(&self, handle: &AssetHandle) -> Result<(), ResolverError> {
        self.register(ASSET_HANDLE_KEY, handle.as_str())
    }

    /// The asset handle, if the frame pipeline has published it.
    pub fn asset_handle(&self) -> Option<AssetHandle> {
        self.check(ASSET_HANDLE_KEY).map(AssetHandle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
