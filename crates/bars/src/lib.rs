//! Session bar building and flattening for the intraday pipeline.
//!
//! This crate handles:
//! - Merging raw bar sources (last value wins per instrument and timestamp)
//! - Bucketing raw bars into fixed-width bars inside a trading session
//! - Flattening bucketed bars through the reverse return chain
//! - Coverage gap detection on raw history
//! - The parallel `build_flat_bars` entry point

pub mod bucket;
pub mod flatten;
pub mod gaps;
pub mod merge;
pub mod pipeline;

pub use bucket::{build_buckets, BucketStats, BucketedBars, SessionBarBuilder};
pub use flatten::{flatten, BarFlattener, FlatBars, FlattenStats};
pub use gaps::{find_coverage_gaps, find_coverage_gaps_with_config, CoverageGap};
pub use merge::{dedup_last_wins, merge_sources, Deduped};
pub use pipeline::{
    build_flat_bars, build_flat_bars_with_config, FlatBarPipeline, FlatBarRun, PipelineStats,
};
