//! Import pipeline components.
//!
//! - [`WorkQueue`] - channel plus completion count, the join barrier
//! - [`WriteBatcher`] - buffers records into bulk inserts
//! - [`RankCache`] - LRU of page ranks for the visit join
//! - [`BlobImporter`] - inflate, parse, join and write one blob
//! - [`Importer`] - runs the worker pools for a whole dataset
//!
//! # Architecture
//!
//! ```text
//! [BlobSource] → WorkQueue → fetch-N ─┐
//!                                     ├→ WorkQueue → import-N → [WriteBatcher] → DocumentStore
//!            (local / fused) ─────────┘                   ↑
//!                                                     RankCache
//! ```

mod batcher;
mod cache;
mod importer;
mod queue;
mod worker;

pub use batcher::{BatcherStats, WriteBatcher};
pub use cache::{CacheStats, RankCache};
pub use importer::{ImportOutcome, ImportReport, Importer};
pub use queue::WorkQueue;
pub use worker::{BlobFailure, BlobImporter, BlobStats};
