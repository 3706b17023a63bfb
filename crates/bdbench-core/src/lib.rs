//! Core types, record grammars, and shared utilities for the Big Data
//! Benchmark loader.
//!
//! This crate provides:
//! - The dataset vocabulary (dataset kinds, size tiers, collection aliasing)
//! - Typed records and the document shape they are stored under
//! - Record parsers for the ranking, user-visit and crawl grammars
//! - Deflate inflation of cached/downloaded blobs
//! - Human-readable size and count formatting for log lines
//! - Prometheus metrics helpers
//! - Shared error types

mod dataset;
mod error;
pub mod format;
pub mod inflate;
pub mod metrics;
pub mod parse;
mod record;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Field delimiter of the tabular (ranking, user-visit) datasets.
pub const FIELD_DELIMITER: char = ',';

/// Default MongoDB database the benchmark queries run against.
pub const DEFAULT_DATABASE: &str = "bigDataBenchmark";

pub use dataset::{Dataset, SizeTier};
pub use error::{Error, Result};
pub use parse::{
    MalformedLines, RecordParser, Records, TrailingDocument, parse_records, parser_for,
};
pub use record::{CrawlDocument, Ranking, Record, UserVisit};
