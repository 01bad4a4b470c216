//! Mirrors a single remote RSS feed into a locally cached, retention-bounded
//! RSS feed, enriching items with their article's `og:image` preview.
//!
//! The whole program is one linear [`pipeline`] run, meant to be triggered by
//! an external scheduler every few hours.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod storage;
pub mod util;

pub use config::Config;
pub use pipeline::{run, run_at, PipelineError, RunSummary};
