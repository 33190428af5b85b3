// src/harvest/mod.rs

//! Crawl orchestration core.
//!
//! The orchestrator drives pagination, category fan-out, concurrent
//! detail enrichment, deduplication and cooperative cancellation. It
//! pulls records through the [`ListingSource`] trait and reports
//! through the [`HarvestSink`] trait; it knows nothing about job state
//! or the request layer.

pub mod orchestrator;
pub mod sink;
pub mod source;

pub use orchestrator::Orchestrator;
pub use sink::{HarvestSink, NullSink};
pub use source::ListingSource;
