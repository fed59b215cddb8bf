//! Frame pipeline: ingest, publish the asset handle, sample thumbnails.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PricingConfig;
use crate::error::{ErrorKind, PipelineError};
use crate::frames::sample::{sample_timestamps, FrameSample};
use crate::frames::service::FrameService;
use crate::pipeline::ledger::CostLedger;
use crate::resolver::DependencyResolver;
use crate::source::VideoSource;

/// Ledger label for frame service charges.
pub const FRAME_SERVICE: &str = "frame-service";

/// Turns a video into an ordered, gap-free-where-possible list of
/// [`FrameSample`]s.  Cheap to clone.
#[derive(Clone)]
pub struct FramePipeline {
    service: Arc<dyn FrameService>,
    pricing: PricingConfig,
    window_secs: u32,
}

impl FramePipeline {
    pub fn new(service: Arc<dyn FrameService>, pricing: PricingConfig, window_secs: u32) -> Self {
        Self {
            service,
            pricing,
            window_secs,
        }
    }

    pub fn window_secs(&self) -> u32 {
        self.window_secs
    }

    /// Run the pipeline once.
    ///
    /// If the resolver already holds a handle (a retry after the thumbnail
    /// step failed) ingest is skipped and the handle reused.  The handle is
    /// published before thumbnails are requested so the transcription
    /// pipeline can proceed as early as possible.
    ///
    /// Timestamps the service did not return are simply absent from the
    /// result; alignment reports them as gaps.
    pub async fn run(
        &self,
        source: &VideoSource,
        resolver: &DependencyResolver,
        ledger: &CostLedger,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<FrameSample>, PipelineError> {
        progress(5);

        let handle = match resolver.asset_handle() {
            Some(existing) => {
                log::info!("frames: reusing asset handle {existing}");
                existing
            }
            None => {
                log::info!("frames: ingesting {}", source.url);
                let handle = self.service.ingest(source).await?;
                ledger.record(FRAME_SERVICE, "ingest", self.pricing.frame_ingest_usd);
                resolver
                    .register_handle(&handle)
                    .map_err(|e| PipelineError::new(ErrorKind::Internal, e.to_string()))?;
                log::info!("frames: asset handle {handle} published");
                handle
            }
        };
        progress(50);

        let timestamps = sample_timestamps(source.duration(), self.window_secs);
        if timestamps.is_empty() {
            log::info!(
                "frames: {:.1}s is shorter than one {}s window, no thumbnails",
                source.duration(),
                self.window_secs
            );
            progress(100);
            return Ok(Vec::new());
        }

        let thumbnails = self.service.thumbnails(&handle, &timestamps).await?;
        ledger.record(
            FRAME_SERVICE,
            format!("{} thumbnails", thumbnails.len()),
            self.pricing.frame_thumbnail_usd * thumbnails.len() as f64,
        );

        // Keep only requested timestamps, one sample each, in order.
        let by_timestamp: BTreeMap<u32, String> = thumbnails
            .into_iter()
            .filter(|t| timestamps.binary_search(&t.timestamp).is_ok())
            .map(|t| (t.timestamp, t.url))
            .collect();

        let samples: Vec<FrameSample> = by_timestamp
            .into_iter()
            .map(|(ts, url)| FrameSample::new(ts, url))
            .collect();

        if samples.len() < timestamps.len() {
            log::warn!(
                "frames: {} of {} thumbnails missing",
                timestamps.len() - samples.len(),
                timestamps.len()
            );
        }
        progress(100);
        Ok(samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
