//! Insight Classifier - heuristic card classification
//!
//! Provides:
//! - [`Classifier`]: ordered rule table over producer prefixes and vocabulary
//! - [`rules`]: the table itself, as data
//! - [`ImageLookup`]: image enrichment seam, with an Unsplash client and a
//!   TTL cache decorator
//! - [`geographic_token`] / [`clean_message`]: text helpers

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod classifier;
pub mod image;
pub mod rules;
pub mod text;
pub mod unsplash;

pub use classifier::{Classification, Classifier};
pub use image::{CachedLookup, ImageError, ImageLookup, ImageRef, NoImages};
pub use rules::{Rule, DEFAULT_RULE, RULES};
pub use text::{clean_message, geographic_token};
pub use unsplash::UnsplashLookup;
