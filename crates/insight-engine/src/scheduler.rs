//! Proactive runs
//!
//! Agents whose manifest carries a `proactive` schedule are re-run on a fixed
//! interval for the broadcast owner. Every tick gets a fresh [`RunContext`],
//! so sticky producers and image choices never leak between ticks.
//!
//! [`RunContext`]: crate::RunContext

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use insight_core::OwnerId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Input handed to the agent on every scheduled tick
pub const PROACTIVE_INPUT: &str = "Proactive Check";

/// Run `agent` every `interval` until the pipeline is cancelled
///
/// The first run happens one interval after the call. Returns the number of
/// runs that were started.
pub fn spawn_proactive(pipeline: Arc<Pipeline>, agent: PathBuf, interval: Duration) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let owner = OwnerId::broadcast();
        let request = match pipeline.request(Some(&agent), PROACTIVE_INPUT) {
            Ok(request) => request,
            Err(e) => {
                warn!(agent = %agent.display(), error = %e, "cannot schedule agent");
                return 0;
            }
        };
        let cancel = pipeline.cancellation().clone();

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(agent = %agent.display(), ?interval, "proactive schedule started");

        let mut ticks = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match pipeline.run(&owner, &request, "").await {
                Err(PipelineError::Cancelled) => break,
                Ok(report) => {
                    ticks += 1;
                    info!(tick = ticks, cards = report.cards_written, "proactive run finished");
                }
                Err(e) => {
                    ticks += 1;
                    warn!(tick = ticks, error = %e, "proactive run failed");
                }
            }
        }
        info!(agent = %agent.display(), ticks, "proactive schedule stopped");
        ticks
    })
}

/// Inspect `agent` and start its proactive schedule if it has one
///
/// # Errors
/// - `PipelineError::Reader` if inspection fails
/// - `PipelineError::NotScheduled` if the manifest has no usable proactive interval
pub async fn schedule_agent(pipeline: Arc<Pipeline>, agent: &Path) -> Result<JoinHandle<usize>, PipelineError> {
    let manifest = pipeline.inspect(agent).await?;
    let interval = manifest
        .proactive_schedule()
        .and_then(insight_reader::Schedule::interval)
        .ok_or_else(|| PipelineError::NotScheduled(manifest.name.clone()))?;
    Ok(spawn_proactive(pipeline, agent.to_path_buf(), interval))
}
