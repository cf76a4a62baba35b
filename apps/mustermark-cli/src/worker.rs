//! Background execution of a marking job
//!
//! The job is blocking, so it runs on the blocking pool while the caller
//! keeps logging progress notices until the join handle completes.

use std::time::Duration;

use anyhow::Context;
use mustermark_core::{MarkJob, MarkSummary};

/// Interval between "still working" notices
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run_job(job: MarkJob, progress_every: Duration) -> anyhow::Result<MarkSummary> {
    let input = job.input.display().to_string();
    tracing::info!("Started marking {}", input);

    let mut handle = tokio::task::spawn_blocking(move || job.run());
    let mut ticker = tokio::time::interval(progress_every);
    // The first tick completes immediately
    ticker.tick().await;

    let result = loop {
        tokio::select! {
            joined = &mut handle => break joined.context("Marking worker panicked")?,
            _ = ticker.tick() => tracing::info!("Still working on {}...", input),
        }
    };

    let summary = result.with_context(|| format!("Failed to mark {}", input))?;
    tracing::info!("Finished marking {}", input);
    Ok(summary)
}
