//! Dataset and size-tier vocabulary.
//!
//! The benchmark publishes three datasets at three sizes. Each dataset lives
//! under `<size>/<dataset>/` both in the local cache and in the S3 bucket, and
//! is imported into one collection. `crawl` is imported into `documents` to
//! match the table names used by the benchmark queries.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One of the benchmark datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// `pageURL,pageRank,avgDuration` rows.
    Rankings,
    /// Nine-column visit log rows, joined with `rankings` on `destURL`.
    UserVisits,
    /// Concatenated crawled HTML pages.
    Crawl,
}

impl Dataset {
    /// All datasets in import order. `rankings` must precede `uservisits`
    /// because visits are enriched from the rankings collection.
    pub const ALL: [Dataset; 3] = [Dataset::Rankings, Dataset::UserVisits, Dataset::Crawl];

    /// Directory / key segment naming this dataset in the source.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Rankings => "rankings",
            Self::UserVisits => "uservisits",
            Self::Crawl => "crawl",
        }
    }

    /// Destination collection.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Rankings => "rankings",
            Self::UserVisits => "uservisits",
            Self::Crawl => "documents",
        }
    }

    /// Whether records are enriched through the rank lookup.
    pub fn needs_rank_join(self) -> bool {
        self == Self::UserVisits
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rankings" => Ok(Self::Rankings),
            "uservisits" => Ok(Self::UserVisits),
            "crawl" | "documents" => Ok(Self::Crawl),
            other => Err(Error::UnknownDataset(other.to_string())),
        }
    }
}

/// Published size of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeTier {
    /// A few MB, for smoke tests.
    #[default]
    Tiny,
    /// Sized for a single node.
    OneNode,
    /// Sized for a five node cluster.
    FiveNodes,
}

impl SizeTier {
    /// Path segment used in the local cache and the S3 prefix.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::OneNode => "1node",
            Self::FiveNodes => "5nodes",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for SizeTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "1node" | "mid" => Ok(Self::OneNode),
            "5nodes" | "large" => Ok(Self::FiveNodes),
            _ => Err(Error::UnknownSizeTier(s.to_string())),
        }
    }
}
