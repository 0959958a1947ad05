//! Agent process runner
//!
//! [`ProcessRunner`] spawns `<bin> run <agent> --input <text> --stream`, reads
//! stdout and stderr on two workers, and hands the merged events to the
//! caller's sink in arrival order. A run returns only after the child exited
//! and both workers drained; a non-zero exit is reported after that.

use crate::error::ReaderError;
use crate::inspect::{self, AgentManifest};
use crate::parser::StreamParser;
use crate::sink::EventSink;
use crate::stream::{pump_diagnostic, pump_primary};
use async_trait::async_trait;
use insight_core::{Event, InsightConfig, MemoryConfig, ProducerTable};
use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One agent invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Agent definition handed to the binary
    pub agent: PathBuf,
    /// Free-form task input
    pub input: String,
    pub memory: Option<MemoryConfig>,
}

impl RunRequest {
    #[must_use]
    pub fn new(agent: impl Into<PathBuf>, input: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            input: input.into(),
            memory: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_memory(mut self, memory: Option<MemoryConfig>) -> Self {
        self.memory = memory;
        self
    }

    /// Command-line arguments for the `run` subcommand
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "run".into(),
            self.agent.clone().into_os_string(),
            "--input".into(),
            self.input.clone().into(),
            "--stream".into(),
        ];
        if let Some(memory) = self.memory.as_ref().filter(|m| m.enabled) {
            let store = if memory.store.is_empty() {
                "inmemory"
            } else {
                memory.store.as_str()
            };
            args.push("--memory-enabled".into());
            args.push(format!("--memory-store={store}").into());
            args.push("--memory-cache=inmemory".into());
        }
        args
    }

    /// `VERTEX_*` variables injected on top of the inherited environment
    #[must_use]
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        [
            ("VERTEX_PROJECT_ID", &memory.project_id),
            ("VERTEX_LOCATION", &memory.location),
            ("VERTEX_CORPUS_NAME", &memory.corpus_name),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Events delivered to the sink
    pub events: usize,
    /// The binary was absent; a single synthetic log event was delivered
    pub binary_missing: bool,
}

/// Something that can execute an agent and stream its events
#[async_trait]
pub trait AgentRunner: Send + Sync + Debug {
    /// Run to completion, delivering events to `sink` one at a time
    async fn run(
        &self,
        request: &RunRequest,
        sink: &mut dyn EventSink,
    ) -> Result<RunOutcome, ReaderError>;

    /// Describe an agent definition
    async fn inspect(&self, agent: &Path) -> Result<AgentManifest, ReaderError> {
        Err(ReaderError::Inspect(format!(
            "inspection unsupported for {}",
            agent.display()
        )))
    }
}

/// Runs the agent as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
    producers: Arc<ProducerTable>,
    event_buffer: usize,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            producers: Arc::new(ProducerTable::default()),
            event_buffer: 256,
        }
    }

    /// Build from configuration, discovering the binary when none is pinned
    #[must_use]
    pub fn from_config(config: &InsightConfig) -> Self {
        let binary = crate::discovery::resolve_binary(
            config.agent.binary.as_deref(),
            &config.agent.candidates,
        );
        info!(binary = %binary.display(), "using agent binary");
        Self::new(binary)
            .with_producers(config.producer_table())
            .with_event_buffer(config.agent.event_buffer)
    }

    #[inline]
    #[must_use]
    pub fn with_producers(mut self, producers: ProducerTable) -> Self {
        self.producers = Arc::new(producers);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl AgentRunner for ProcessRunner {
    async fn run(
        &self,
        request: &RunRequest,
        sink: &mut dyn EventSink,
    ) -> Result<RunOutcome, ReaderError> {
        let mut command = Command::new(&self.binary);
        command
            .args(request.args())
            .envs(request.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary.display(), agent = %request.agent.display(), "spawning agent");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(binary = %self.binary.display(), "agent binary not found");
                sink.accept(Event::log(format!(
                    "ERROR: agent binary not found at {}",
                    self.binary.display()
                )))
                .await;
                return Ok(RunOutcome {
                    events: 1,
                    binary_missing: true,
                });
            }
            Err(source) => {
                return Err(ReaderError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })
            }
        };

        let stdout = child.stdout.take().ok_or(ReaderError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ReaderError::MissingPipe("stderr"))?;

        let (tx, mut rx) = mpsc::channel(self.event_buffer);
        let primary = tokio::spawn(pump_primary(
            stdout,
            StreamParser::new(Arc::clone(&self.producers)),
            tx.clone(),
        ));
        let diagnostic = tokio::spawn(pump_diagnostic(stderr, tx));

        // Closes once both workers dropped their senders.
        let mut events = 0;
        while let Some(event) = rx.recv().await {
            sink.accept(event).await;
            events += 1;
        }

        for (stream, worker) in [("stdout", primary), ("stderr", diagnostic)] {
            match worker.await {
                Ok(Ok(forwarded)) => debug!(stream, forwarded, "stream drained"),
                Ok(Err(e)) => warn!(stream, error = %e, "stream read failed"),
                Err(e) => return Err(ReaderError::Worker(e.to_string())),
            }
        }

        let status = child.wait().await.map_err(ReaderError::Wait)?;
        if !status.success() {
            warn!(code = ?status.code(), events, "agent exited unsuccessfully");
            return Err(ReaderError::NonZeroExit {
                code: status.code(),
            });
        }

        info!(events, "agent run complete");
        Ok(RunOutcome {
            events,
            binary_missing: false,
        })
    }

    async fn inspect(&self, agent: &Path) -> Result<AgentManifest, ReaderError> {
        inspect::inspect(&self.binary, agent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_request_args() {
        let request = RunRequest::new("agents/trip.yaml", "Plan Kyoto");
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["run", "agents/trip.yaml", "--input", "Plan Kyoto", "--stream"]);
        assert!(request.env().is_empty());
    }

    #[test]
    fn memory_flags_and_env() {
        let memory = MemoryConfig {
            enabled: true,
            store: String::new(),
            project_id: Some("proj".into()),
            location: Some(String::new()),
            corpus_name: Some("corpus".into()),
        };
        let request = RunRequest::new("a.yaml", "x").with_memory(Some(memory));
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--memory-enabled".to_string()));
        assert!(args.contains(&"--memory-store=inmemory".to_string()));
        assert!(args.contains(&"--memory-cache=inmemory".to_string()));
        assert_eq!(
            request.env(),
            vec![
                ("VERTEX_PROJECT_ID", "proj".to_string()),
                ("VERTEX_CORPUS_NAME", "corpus".to_string()),
            ]
        );
    }

    #[test]
    fn disabled_memory_adds_no_flags() {
        let request = RunRequest::new("a.yaml", "x").with_memory(Some(MemoryConfig::default()));
        assert_eq!(request.args().len(), 5);
    }

    #[tokio::test]
    async fn missing_binary_degrades_to_one_log_event() {
        let runner = ProcessRunner::new("/definitely/not/here/agent-bin");
        let mut sink: Vec<Event> = Vec::new();

        let outcome = runner
            .run(&RunRequest::new("a.yaml", "x"), &mut sink)
            .await
            .unwrap();

        assert!(outcome.binary_missing);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].kind, insight_core::EventKind::Log);
        assert!(sink[0].text.contains("binary not found"));
    }
}
