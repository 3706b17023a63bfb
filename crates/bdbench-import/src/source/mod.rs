//! Blob sources.
//!
//! A source enumerates the compressed partitions of one dataset at one size
//! tier as [`WorkItem`]s:
//!
//! - [`BlobSource::Local`] - `<root>/<size>/<dataset>/*.deflate` cache files,
//!   read lazily as the items are consumed
//! - [`BlobSource::Remote`] - object keys under `<prefix>/<size>/<dataset>/`,
//!   each of which still has to be fetched with [`fetch_blob`]
//!
//! Listing happens once, synchronously, before any worker starts.

mod local;
mod s3;

pub use s3::{S3Config, S3ObjectStore};

use crate::{Error, Result};
use bdbench_core::format::{human_bytes, per_second};
use bdbench_core::{Dataset, SizeTier};
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// One whole compressed partition, ready to import.
#[derive(Clone)]
pub struct Blob {
    /// File name of the partition, used in log lines.
    pub name: String,
    pub dataset: Dataset,
    /// Deflated bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("name", &self.name)
            .field("dataset", &self.dataset)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A remote object still to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    /// Full object key.
    pub key: String,
    /// Last path segment of the key.
    pub name: String,
    /// Dataset named by the second-to-last path segment.
    pub dataset: Dataset,
    /// Size reported by the listing.
    pub size: u64,
}

impl ObjectKey {
    /// Derive the name and dataset from `.../<dataset>/<name>`.
    pub fn parse(key: &str, size: u64) -> Result<Self> {
        let mut segments = key.rsplit('/');
        let name = segments.next().unwrap_or_default();
        let dataset_dir = segments.next().unwrap_or_default();
        let dataset = dataset_dir.parse::<Dataset>()?;

        Ok(Self {
            key: key.to_string(),
            name: name.to_string(),
            dataset,
            size,
        })
    }
}

/// A unit of work claimed by a worker.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Bytes already in memory.
    Blob(Blob),
    /// Bytes that must be fetched first.
    Remote(ObjectKey),
}

impl WorkItem {
    /// Name used in log lines.
    pub fn name(&self) -> &str {
        match self {
            Self::Blob(b) => &b.name,
            Self::Remote(k) => &k.name,
        }
    }
}

/// An entry of an object listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// A key/value object store holding the compressed partitions.
pub trait ObjectStore: Send + Sync {
    /// List every object under `prefix`, following pagination to the end.
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// Fetch the full content of one object.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Human-readable location, for log lines.
    fn describe(&self) -> String {
        "object store".to_string()
    }
}

/// Where blobs come from.
#[derive(Clone)]
pub enum BlobSource {
    /// Previously downloaded cache files.
    Local { root: PathBuf },
    /// Objects listed and fetched from an object store.
    Remote {
        store: Arc<dyn ObjectStore>,
        prefix: String,
    },
}

impl fmt::Debug for BlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            Self::Remote { store, prefix } => f
                .debug_struct("Remote")
                .field("store", &store.describe())
                .field("prefix", prefix)
                .finish(),
        }
    }
}

impl BlobSource {
    /// Whether items from this source need a fetch stage.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// List the blobs of a dataset, at most `limit` of them.
    ///
    /// A local listing with no files is [`Error::NoDataFound`]. The returned
    /// iterator reads local files only as it is advanced.
    pub fn enumerate(
        &self,
        dataset: Dataset,
        size: SizeTier,
        limit: Option<usize>,
    ) -> Result<WorkItems> {
        let pending = match self {
            Self::Local { root } => {
                let files = local::list_files(root, dataset, size, limit)?;
                tracing::info!(
                    "Found {} local file(s) for {} ({})",
                    files.len(),
                    dataset,
                    size
                );
                files.into_iter().map(Pending::File).collect()
            }
            Self::Remote { store, prefix } => {
                let prefix = remote_prefix(prefix, dataset, size);
                let mut keys = Vec::new();
                for object in store.list(&prefix)? {
                    if object.key.ends_with('/') {
                        continue;
                    }
                    keys.push(ObjectKey::parse(&object.key, object.size)?);
                }
                keys.sort_by(|a, b| a.key.cmp(&b.key));
                if let Some(limit) = limit {
                    keys.truncate(limit);
                }
                tracing::info!(
                    "Found {} object(s) under {} in {}",
                    keys.len(),
                    prefix,
                    store.describe()
                );
                keys.into_iter().map(Pending::Key).collect()
            }
        };

        Ok(WorkItems { dataset, pending })
    }
}

/// `<prefix>/<size>/<dataset>/`
fn remote_prefix(prefix: &str, dataset: Dataset, size: SizeTier) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{}/{}/", size.dir_name(), dataset.dir_name())
    } else {
        format!("{}/{}/{}/", prefix, size.dir_name(), dataset.dir_name())
    }
}

enum Pending {
    File(PathBuf),
    Key(ObjectKey),
}

/// The enumerated blobs of one dataset.
pub struct WorkItems {
    dataset: Dataset,
    pending: VecDeque<Pending>,
}

impl WorkItems {
    /// Items not yet yielded.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Iterator for WorkItems {
    type Item = Result<WorkItem>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.pending.pop_front()? {
            Pending::File(path) => local::read_blob(&path, self.dataset).map(WorkItem::Blob),
            Pending::Key(key) => Ok(WorkItem::Remote(key)),
        };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

/// Download one remote object into a [`Blob`].
pub fn fetch_blob(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Blob> {
    let start = Instant::now();
    let bytes = store.get(&key.key)?;
    let elapsed = start.elapsed();

    tracing::info!(
        "Downloaded {} ({}) in {:.2}s ({}/s)",
        key.name,
        human_bytes(bytes.len() as f64),
        elapsed.as_secs_f64(),
        human_bytes(per_second(bytes.len() as f64, elapsed))
    );
    metrics::histogram!("import_fetch_duration_seconds").record(elapsed.as_secs_f64());

    Ok(Blob {
        name: key.name.clone(),
        dataset: key.dataset,
        bytes,
    })
}

/// Wrap an object store failure with what was being attempted.
pub(crate) fn transport_error(context: &str, err: impl fmt::Display) -> Error {
    Error::S3(format!("{context}: {err}"))
}
