//! Testing utilities for the insight stream workspace
//!
//! Shared runners, image lookups and event fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use insight_classifier::{ImageError, ImageLookup, ImageRef};
use insight_core::{Event, EventKind, ManualClock, OwnerId, SilenceWindow};
use insight_reader::{AgentManifest, AgentRunner, EventSink, ReaderError, RunOutcome, RunRequest};
use insight_store::MemoryCardStore;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted step of a fake agent run
#[derive(Debug, Clone)]
pub enum Step {
    Emit(Event),
    /// Move the shared manual clock forward
    Advance(Duration),
}

/// Agent runner replaying a fixed script
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    steps: Vec<Step>,
    exit_code: Option<i32>,
    manifest: Option<AgentManifest>,
    clock: Option<Arc<ManualClock>>,
    requests: Mutex<Vec<RunRequest>>,
    runs: AtomicUsize,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            steps: events.into_iter().map(Step::Emit).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Fail with a non-zero exit after replaying everything
    #[must_use]
    pub fn failing_with(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    #[must_use]
    pub fn with_manifest(mut self, manifest: AgentManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Clock moved by [`Step::Advance`]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run(
        &self,
        request: &RunRequest,
        sink: &mut dyn EventSink,
    ) -> Result<RunOutcome, ReaderError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let mut events = 0;
        for step in &self.steps {
            match step {
                Step::Emit(event) => {
                    sink.accept(event.clone()).await;
                    events += 1;
                }
                Step::Advance(by) => {
                    if let Some(clock) = &self.clock {
                        clock.advance(*by);
                    }
                }
            }
        }

        match self.exit_code {
            Some(code) => Err(ReaderError::NonZeroExit { code: Some(code) }),
            None => Ok(RunOutcome {
                events,
                binary_missing: false,
            }),
        }
    }

    async fn inspect(&self, agent: &Path) -> Result<AgentManifest, ReaderError> {
        self.manifest
            .clone()
            .ok_or_else(|| ReaderError::Inspect(format!("no manifest for {}", agent.display())))
    }
}

/// Image lookup answering every query with one picture, counting calls
#[derive(Debug)]
pub struct StaticImages {
    image: Option<ImageRef>,
    calls: AtomicUsize,
}

impl StaticImages {
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            image: Some(ImageRef::new(url).with_credit("Tester", "https://example.com/@tester")),
            calls: AtomicUsize::new(0),
        }
    }

    /// Lookup that never finds anything
    #[must_use]
    pub fn none() -> Self {
        Self {
            image: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageLookup for StaticImages {
    async fn lookup(&self, _query: &str) -> Result<Option<ImageRef>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image.clone())
    }
}

/// Framed chunk tagged with a producer
#[must_use]
pub fn tagged(node: &str, text: &str) -> Event {
    Event::chunk(Some(node), text)
}

/// Untagged chunk, as plain-text output after the first line
#[must_use]
pub fn untagged(text: &str) -> Event {
    Event::chunk(None, text)
}

/// Terminal marker with an `output` payload
#[must_use]
pub fn done(output: &str) -> Event {
    Event::done(serde_json::json!({ "output": output }).to_string())
}

/// Terminal frame that also carries a producer's closing text
#[must_use]
pub fn final_frame(node: &str, text: &str, output: &str) -> Event {
    let raw = serde_json::json!({ "node": node, "message": text, "output": output }).to_string();
    Event::new(EventKind::Done, Some(node.to_string()), text).with_raw(raw)
}

#[must_use]
pub fn error_frame(text: &str) -> Event {
    Event::new(EventKind::Error, None, text)
}

/// A short trip-guardian style run touching three producers
#[must_use]
pub fn trip_script() -> Vec<Event> {
    vec![
        tagged("Guardian Assistant", "Starting your safety scan"),
        tagged("NewsAlert", "Storm incoming"),
        tagged("NewsAlert", " near the coast"),
        tagged("CheckWeather", "Sunny in Kyoto"),
        untagged(", light rain by evening"),
        tagged("GeniusLoci", "Bow when greeting shopkeepers"),
        Event::log("DEBUG pipeline tick"),
        done("Report generated."),
    ]
}

#[must_use]
pub fn owner(id: &str) -> OwnerId {
    OwnerId::new(id)
}

/// In-memory store on a manual clock
#[must_use]
pub fn memory_store(clock: &Arc<ManualClock>, window: SilenceWindow) -> Arc<MemoryCardStore> {
    Arc::new(MemoryCardStore::new(clock.clone(), window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_fixture_carries_output() {
        let event = done("He said \"hi\"");
        assert_eq!(event.done_output().as_deref(), Some("He said \"hi\""));
    }

    #[test]
    fn final_frame_carries_node_text_and_output() {
        let event = final_frame("GenerateReport", "Ready", "Report generated.");
        assert_eq!(event.node.as_deref(), Some("GenerateReport"));
        assert_eq!(event.display_text(), "Ready");
        assert_eq!(event.done_output().as_deref(), Some("Report generated."));
    }

    #[tokio::test]
    async fn scripted_runner_replays_and_fails_after() {
        let runner = ScriptedRunner::new(vec![tagged("A", "one"), tagged("A", "two")]).failing_with(3);
        let mut sink: Vec<Event> = Vec::new();
        let err = runner
            .run(&RunRequest::new("a.yaml", "x"), &mut sink)
            .await
            .unwrap_err();

        assert_eq!(sink.len(), 2);
        assert!(matches!(err, ReaderError::NonZeroExit { code: Some(3) }));
        assert_eq!(runner.runs(), 1);
        assert_eq!(runner.requests()[0].input, "x");
    }
}
