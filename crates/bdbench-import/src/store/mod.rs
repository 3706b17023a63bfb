//! Document store seam.
//!
//! The pipeline talks to the database through [`DocumentStore`]:
//!
//! - [`MongoStore`] - the MongoDB sync driver
//! - [`MemoryStore`] - in-process collections, for tests and dry runs
//!
//! Implementations must be safe to share across worker threads; the pipeline
//! holds one `Arc<dyn DocumentStore>` for a whole run.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::{MongoConfig, MongoStore};

use crate::Result;
use bdbench_core::Record;

/// Collection holding the ranks that visits are joined against.
pub const RANKINGS_COLLECTION: &str = "rankings";

/// Operations the importer needs from the database.
pub trait DocumentStore: Send + Sync {
    /// Number of documents in a collection (zero if it does not exist).
    fn count(&self, collection: &str) -> Result<u64>;

    /// Drop a collection.
    fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Drop the whole database.
    fn drop_database(&self) -> Result<()>;

    /// Ensure the compound `{_id: 1, pageRank: 1}` index on `rankings`, so
    /// rank lookups are answered from the index alone.
    fn ensure_rank_index(&self) -> Result<()>;

    /// Insert records in order, returning how many were written.
    ///
    /// Stops at the first existing `_id` and returns
    /// [`Error::DuplicateKey`](crate::Error::DuplicateKey); the records
    /// before it stay written.
    fn insert_many(&self, collection: &str, records: &[Record]) -> Result<usize>;

    /// Point lookup of a page's rank, projecting only `pageRank`.
    fn find_page_rank(&self, url: &str) -> Result<Option<i32>>;
}
