//! Command-line entry point.
//!
//! ```text
//! pitch-analyzer <video-url> <duration-secs>
//! ```
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the coordinator with HTTP clients for both services.
//! 4. Log every status event pushed on the bus.
//! 5. Run the submission; Ctrl-C cancels it.
//! 6. Write the SRT transcript and the analysis handoff next to each other
//!    under the data dir and print the handoff as JSON.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pitch_analyzer::{
    config::{AppConfig, AppPaths},
    pipeline::{Coordinator, Submission, SubmissionPhase},
    source::VideoSource,
    transcription::to_srt,
};

fn parse_args() -> Result<VideoSource> {
    let mut args = std::env::args().skip(1);
    let (Some(url), Some(duration)) = (args.next(), args.next()) else {
        bail!("usage: pitch-analyzer <video-url> <duration-secs>");
    };
    let duration_secs: f64 = duration
        .parse()
        .with_context(|| format!("invalid duration '{duration}'"))?;
    if !duration_secs.is_finite() || duration_secs < 0.0 {
        bail!("duration must be a non-negative number of seconds");
    }
    Ok(VideoSource::new(url, duration_secs))
}

fn write_outputs(dir: &Path, submission: &Submission) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;

    if let Some(segments) = submission
        .transcription_status()
        .succeeded()
        .and_then(|out| out.segments().map(<[_]>::to_vec))
    {
        let path = dir.join("transcript.srt");
        std::fs::write(&path, to_srt(&segments))?;
        log::info!("wrote {}", path.display());
    }

    if let Some(handoff) = submission.handoff() {
        let json = handoff.to_json()?;
        let path = dir.join("handoff.json");
        std::fs::write(&path, &json)?;
        log::info!("wrote {}", path.display());
        println!("{json}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Config
    let source = parse_args()?;
    let config = AppConfig::load().context("loading settings.toml")?;
    log::info!(
        "policy {:?}, retry every {:?}",
        config.policy,
        config.retry.interval()
    );

    // 3. Coordinator
    let coordinator = Coordinator::from_config(&config);

    // 4. Status events
    let mut events = coordinator.bus().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match (&event.status.waiting_reason, &event.status.error_message) {
                (Some(reason), _) => log::info!("{}: waiting, {reason}", event.pipeline),
                (_, Some(message)) => log::error!("{}: failed, {message}", event.pipeline),
                _ => log::debug!(
                    "{}: {} {}%",
                    event.pipeline,
                    event.status.phase.label(),
                    event.status.progress_percent
                ),
            }
        }
    });

    // 5. Run with Ctrl-C cancellation
    let submission = Arc::new(Submission::new(source));
    {
        let submission = Arc::clone(&submission);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                submission.cancel();
            }
        });
    }

    let snapshot = coordinator.run(&submission).await;

    // 6. Outputs
    let dir = AppPaths::new().output_dir.join(submission.id().to_string());
    write_outputs(&dir, &submission)?;
    log::info!("total cost {}", snapshot.cost.display_total());

    match snapshot.phase {
        SubmissionPhase::Aligned | SubmissionPhase::Degraded => Ok(()),
        SubmissionPhase::Cancelled => bail!("submission cancelled"),
        phase => bail!(
            "submission ended as {phase:?} (frames: {:?}, transcription: {:?})",
            snapshot.frames.error_message,
            snapshot.transcription.error_message
        ),
    }
}
