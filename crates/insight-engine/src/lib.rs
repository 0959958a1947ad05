//! Insight Engine - from agent stream to live feed
//!
//! - [`Accumulator`]: folds events into one growing card per producer
//! - [`RunContext`]: the state a single run owns
//! - [`Pipeline`]: runs, feed reads, clears and subscriptions behind one facade
//! - [`spawn_proactive`]: interval runs for the broadcast owner
//!
//! # Example
//!
//! ```rust,no_run
//! use insight_core::{InsightConfig, OwnerId};
//! use insight_engine::Pipeline;
//!
//! # async fn example() -> Result<(), insight_engine::PipelineError> {
//! let pipeline = Pipeline::from_config(InsightConfig::load(None)?)?;
//! let request = pipeline.request(Some(std::path::Path::new("agents/trip.yaml")), "Plan my Kyoto trip")?;
//! let report = pipeline.run(&OwnerId::new("device-1"), &request, "Kyoto, Japan").await?;
//! println!("{} cards written", report.cards_written);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod accumulator;
pub mod context;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod scheduler;

pub use accumulator::Accumulator;
pub use context::{RunContext, RunStats};
pub use error::PipelineError;
pub use filter::{SkipFilter, SkipReason};
pub use pipeline::{Pipeline, RunReport};
pub use scheduler::{schedule_agent, spawn_proactive, PROACTIVE_INPUT};
