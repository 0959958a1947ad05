//! Pipeline facade
//!
//! Wires reader, classifier, accumulator, store and notifier together and
//! exposes what a transport layer needs: start a run, read or clear a feed,
//! subscribe to changes.

use crate::accumulator::Accumulator;
use crate::context::{RunContext, RunStats};
use crate::error::PipelineError;
use async_trait::async_trait;
use insight_classifier::Classifier;
use insight_core::{Card, Clock, Event, InsightConfig, OwnerId, SystemClock};
use insight_reader::{AgentManifest, AgentRunner, EventSink, ProcessRunner, RunRequest};
use insight_store::{open_store, CardStore, FeedNotifier, Subscription};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub events: usize,
    pub cards_written: usize,
    pub dropped: usize,
    pub flushed: usize,
    pub errors: usize,
    /// The agent binary was absent and the run degraded to a log line
    pub binary_missing: bool,
    /// Producers that got text, sorted
    pub producers: Vec<String>,
    pub final_output: String,
}

impl RunReport {
    fn from_context(ctx: &RunContext, binary_missing: bool) -> Self {
        let RunStats {
            events,
            cards_written,
            dropped,
            flushed,
            errors,
            ..
        } = ctx.stats();
        Self {
            events,
            cards_written,
            dropped,
            flushed,
            errors,
            binary_missing,
            producers: ctx.producers().into_iter().map(str::to_string).collect(),
            final_output: ctx.final_output(),
        }
    }
}

/// Feeds reader events into the accumulator, one at a time
struct RunSink<'a> {
    accumulator: &'a Accumulator,
    ctx: &'a mut RunContext,
}

#[async_trait]
impl EventSink for RunSink<'_> {
    async fn accept(&mut self, event: Event) {
        self.accumulator.accumulate(&event, &mut *self.ctx).await;
    }
}

/// End-to-end card pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<InsightConfig>,
    runner: Arc<dyn AgentRunner>,
    store: Arc<dyn CardStore>,
    accumulator: Arc<Accumulator>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Assemble from parts; the clock drives both accumulation and the store
    #[must_use]
    pub fn new(
        config: InsightConfig,
        runner: Arc<dyn AgentRunner>,
        classifier: Classifier,
        store: Arc<dyn CardStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let notifier = FeedNotifier::from_config(&config.notifier);
        let accumulator = Accumulator::new(&config, Arc::new(classifier), Arc::clone(&store), notifier)
            .with_clock(clock);
        Self {
            config: Arc::new(config),
            runner,
            store,
            accumulator: Arc::new(accumulator),
            cancel: CancellationToken::new(),
        }
    }

    /// Production wiring: agent process, configured image lookup and store
    ///
    /// # Errors
    /// - `PipelineError::Images` if the HTTP client cannot be built
    /// - `PipelineError::Store` if the database cannot be opened
    pub fn from_config(config: InsightConfig) -> Result<Self, PipelineError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let runner = Arc::new(ProcessRunner::from_config(&config));
        let classifier = Classifier::from_config(&config)?;
        let store = open_store(&config.store, Arc::clone(&clock))?;
        Ok(Self::new(config, runner, classifier, store, clock))
    }

    /// Share a cancellation token with the caller
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop starting new runs; runs in flight finish their stream
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Build a run request, falling back to the configured default agent
    ///
    /// # Errors
    /// - `PipelineError::NoAgent` if neither is available
    pub fn request(&self, agent: Option<&Path>, input: &str) -> Result<RunRequest, PipelineError> {
        let agent = agent
            .or(self.config.agent.default_agent.as_deref())
            .ok_or(PipelineError::NoAgent)?;
        Ok(RunRequest::new(agent, input).with_memory(self.config.agent.memory.clone()))
    }

    /// Run an agent for `owner` with a fresh context
    ///
    /// # Errors
    /// - `PipelineError::Cancelled` if cancelled before the process started
    /// - `PipelineError::Reader` if the process failed; cards written before
    ///   the failure are kept and flushed
    pub async fn run(
        &self,
        owner: &OwnerId,
        request: &RunRequest,
        destination: &str,
    ) -> Result<RunReport, PipelineError> {
        let mut ctx = RunContext::new(owner.clone(), destination);
        self.run_with_context(request, &mut ctx).await
    }

    /// Run with a caller-owned context
    ///
    /// # Errors
    /// Same as [`Pipeline::run`].
    #[instrument(skip_all, fields(owner = %ctx.owner(), agent = %request.agent.display()))]
    pub async fn run_with_context(
        &self,
        request: &RunRequest,
        ctx: &mut RunContext,
    ) -> Result<RunReport, PipelineError> {
        if self.cancel.is_cancelled() {
            info!("run skipped, pipeline cancelled");
            return Err(PipelineError::Cancelled);
        }

        info!("run started");
        let result = {
            let mut sink = RunSink {
                accumulator: &self.accumulator,
                ctx: &mut *ctx,
            };
            self.runner.run(request, &mut sink).await
        };

        self.accumulator.flush(ctx).await;

        match result {
            Ok(outcome) => {
                let report = RunReport::from_context(ctx, outcome.binary_missing);
                info!(
                    events = report.events,
                    cards = report.cards_written,
                    dropped = report.dropped,
                    "run finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "agent run failed");
                Err(e.into())
            }
        }
    }

    /// Describe an agent definition
    ///
    /// # Errors
    /// - `PipelineError::Reader` if inspection fails
    pub async fn inspect(&self, agent: &Path) -> Result<AgentManifest, PipelineError> {
        Ok(self.runner.inspect(agent).await?)
    }

    /// Newest cards first; `None` uses the configured page size
    ///
    /// # Errors
    /// - `PipelineError::Store` on storage failure
    pub async fn feed(&self, owner: &OwnerId, limit: Option<usize>) -> Result<Vec<Card>, PipelineError> {
        let limit = limit.unwrap_or(self.config.store.feed_page_size);
        Ok(self.store.get_feed(owner, limit).await?)
    }

    /// Delete an owner's cards and tell their viewers
    ///
    /// # Errors
    /// - `PipelineError::Store` on storage failure
    pub async fn clear_feed(&self, owner: &OwnerId) -> Result<usize, PipelineError> {
        let removed = self.store.delete_feed(owner).await?;
        self.accumulator.notifier().publish(owner);
        info!(%owner, removed, "feed cleared");
        Ok(removed)
    }

    /// Live change pulses for an owner's feed
    #[must_use]
    pub fn subscribe(&self, owner: &OwnerId) -> Subscription {
        self.accumulator.notifier().subscribe(owner)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CardStore> {
        &self.store
    }
}
