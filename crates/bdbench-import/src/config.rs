//! Import configuration.

use crate::{Error, Result};
use bdbench_core::{Dataset, MalformedLines, SizeTier, TrailingDocument};
use std::num::NonZeroUsize;

/// Worker pool layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers that download remote blobs. In fused mode these also import.
    pub download_threads: usize,

    /// Workers that inflate, parse and write blobs.
    pub import_threads: usize,

    /// Run downloads and imports in separate pools joined by a queue.
    /// Only meaningful for remote sources.
    pub separate_threads: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            download_threads: 1,
            import_threads: 1,
            separate_threads: false,
        }
    }
}

/// Configuration for a dataset import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Size tier to import.
    pub size: SizeTier,

    /// Worker pool layout.
    pub pools: PoolConfig,

    /// Maximum documents per bulk insert.
    pub batch_size: usize,

    /// Capacity of the rank lookup cache used for `uservisits`.
    pub cache_capacity: usize,

    /// Drop each destination collection before importing into it.
    pub drop_collection: bool,

    /// Drop the whole database before the first dataset.
    pub drop_database: bool,

    /// Policy for tabular lines that do not fit their schema.
    pub malformed_lines: MalformedLines,

    /// Policy for the crawl page still open at the end of a blob.
    pub trailing_document: TrailingDocument,

    /// Cap on blobs per dataset.
    pub limit: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            size: SizeTier::Tiny,
            pools: PoolConfig::default(),
            batch_size: 500,
            cache_capacity: 10_000,
            drop_collection: false,
            drop_database: false,
            malformed_lines: MalformedLines::Abort,
            trailing_document: TrailingDocument::Emit,
            limit: None,
        }
    }
}

impl ImportConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pools.download_threads == 0 {
            return Err(Error::Config("download threads must be at least 1".into()));
        }
        if self.pools.import_threads == 0 {
            return Err(Error::Config("import threads must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Cache capacity as the non-zero value the cache needs.
    pub fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| Error::Config("cache capacity must be at least 1".into()))
    }
}

/// Which datasets a run covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetSelection {
    pub skip_rankings: bool,
    pub skip_uservisits: bool,
    pub skip_crawls: bool,
    pub only_uservisits: bool,
}

impl DatasetSelection {
    /// Selected datasets in import order.
    pub fn datasets(&self) -> Vec<Dataset> {
        if self.only_uservisits {
            return vec![Dataset::UserVisits];
        }
        Dataset::ALL
            .into_iter()
            .filter(|d| match d {
                Dataset::Rankings => !self.skip_rankings,
                Dataset::UserVisits => !self.skip_uservisits,
                Dataset::Crawl => !self.skip_crawls,
            })
            .collect()
    }
}
