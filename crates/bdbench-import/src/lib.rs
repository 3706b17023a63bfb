//! Big Data Benchmark loader.
//!
//! Downloads (or reads from a local cache) the deflated text partitions of
//! the `rankings`, `uservisits` and `crawl` datasets and bulk-inserts them
//! into MongoDB with pools of worker threads.
//!
//! # Modules
//!
//! - [`source`] - Blob sources (local cache files, S3 objects)
//! - [`store`] - Document store seam (MongoDB, in-memory)
//! - [`pipeline`] - Work queues, batching, the rank cache and the importer
//! - [`config`] - Import settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   BlobSource    │  data/<size>/<dataset>/*.deflate or s3://<bucket>/<prefix>/...
//! └────────┬────────┘
//!          │ WorkItems
//!          ▼
//! ┌─────────────────┐
//! │  fetch workers  │  remote only; fused with import unless --separate-threads
//! └────────┬────────┘
//!          │ Blobs
//!          ▼
//! ┌─────────────────┐
//! │ import workers  │  inflate → parse → rank join → WriteBatcher
//! └────────┬────────┘
//!          │ insert_many
//!          ▼
//! ┌─────────────────┐
//! │  DocumentStore  │  rankings, uservisits, documents
//! └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;

pub use error::{Error, Result};

pub use config::{DatasetSelection, ImportConfig, PoolConfig};

pub use pipeline::{
    BlobImporter, CacheStats, ImportOutcome, ImportReport, Importer, RankCache, WorkQueue,
    WriteBatcher,
};

pub use source::{
    Blob, BlobSource, ObjectKey, ObjectStore, RemoteObject, S3Config, S3ObjectStore, WorkItem,
    WorkItems, fetch_blob,
};

pub use store::{DocumentStore, MemoryStore, MongoConfig, MongoStore};
