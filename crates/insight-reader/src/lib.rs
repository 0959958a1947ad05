//! Insight Reader - agent process output normalization
//!
//! Turns the raw stdout/stderr of an agent process into typed [`Event`]s:
//! - [`StreamParser`]: framed/plain-text state machine for the primary stream
//! - [`ProcessRunner`]: spawns the agent and joins both stream workers
//! - [`inspect`]: the agent's self-description (nodes, schedule)
//! - [`discovery`]: locating the agent binary
//!
//! [`Event`]: insight_core::Event

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod discovery;
pub mod error;
pub mod inspect;
pub mod parser;
pub mod runner;
pub mod sink;
pub mod stream;

pub use discovery::{discover_binary, resolve_binary};
pub use error::ReaderError;
pub use inspect::{parse_duration, AgentManifest, Schedule};
pub use parser::{FramingMode, StreamParser};
pub use runner::{AgentRunner, ProcessRunner, RunOutcome, RunRequest};
pub use sink::EventSink;
