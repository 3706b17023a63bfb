//! Dataset import orchestration.
//!
//! One [`Importer::import_data_set`] call is one bounded unit of work:
//!
//! 1. Skip the dataset if its collection already holds documents
//! 2. Ensure the rank index before importing visits
//! 3. Enumerate the source and feed a [`WorkQueue`]
//! 4. Run named worker threads until the queue is closed and drained
//!
//! Remote sources run either fused (each worker fetches and imports) or
//! staged (fetchers feed importers through a second queue). Local sources
//! only have the import stage.

use super::cache::{CacheStats, RankCache};
use super::queue::WorkQueue;
use super::worker::{BlobImporter, BlobStats};
use crate::config::ImportConfig;
use crate::source::{Blob, BlobSource, ObjectKey, WorkItem, WorkItems, fetch_blob};
use crate::store::DocumentStore;
use crate::{Error, Result};
use bdbench_core::format::{group_thousands, human_bytes, per_second};
use bdbench_core::{Dataset, metrics};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, Scope};
use std::time::{Duration, Instant};
use tracing::Span;

/// Buffered items per worker before producers block.
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Whether a dataset was imported or left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    /// The collection already held `existing` documents.
    Skipped { existing: u64 },
}

/// Summary of one dataset import.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub dataset: Dataset,
    pub collection: &'static str,
    pub outcome: ImportOutcome,
    /// Blobs enumerated.
    pub blobs_total: usize,
    /// Blobs fully imported.
    pub blobs_processed: usize,
    /// Blobs whose read, fetch or import failed.
    pub blobs_failed: usize,
    pub records_imported: u64,
    pub records_skipped: u64,
    pub bytes_compressed: u64,
    pub bytes_inflated: u64,
    pub cache: Option<CacheStats>,
    pub elapsed: Duration,
}

impl ImportReport {
    fn skipped(dataset: Dataset, existing: u64, elapsed: Duration) -> Self {
        Self {
            dataset,
            collection: dataset.collection_name(),
            outcome: ImportOutcome::Skipped { existing },
            blobs_total: 0,
            blobs_processed: 0,
            blobs_failed: 0,
            records_imported: 0,
            records_skipped: 0,
            bytes_compressed: 0,
            bytes_inflated: 0,
            cache: None,
            elapsed,
        }
    }

    /// Every enumerated blob was imported.
    pub fn is_complete(&self) -> bool {
        self.blobs_failed == 0 && self.blobs_processed == self.blobs_total
    }

    /// Log the one-line summary, with the collection's final size if known.
    pub fn log_summary(&self, collection_count: Option<u64>) {
        let count = collection_count
            .map(|c| format!(", {} now holds {}", self.collection, group_thousands(c)))
            .unwrap_or_default();

        match self.outcome {
            ImportOutcome::Skipped { existing } => tracing::info!(
                "{}: skipped ({} existing documents){}",
                self.dataset,
                group_thousands(existing),
                count
            ),
            ImportOutcome::Imported => tracing::info!(
                "{}: {}/{} blobs imported, {} failed, {} records ({} skipped) in {:.1}s ({:.0} records/s, {} inflated){}",
                self.dataset,
                self.blobs_processed,
                self.blobs_total,
                self.blobs_failed,
                group_thousands(self.records_imported),
                group_thousands(self.records_skipped),
                self.elapsed.as_secs_f64(),
                per_second(self.records_imported as f64, self.elapsed),
                human_bytes(self.bytes_inflated as f64),
                count
            ),
        }
    }
}

/// Shared counters for one dataset run.
#[derive(Default)]
struct ImportCounters {
    blobs_processed: AtomicUsize,
    blobs_failed: AtomicUsize,
    records_imported: AtomicU64,
    records_skipped: AtomicU64,
    bytes_compressed: AtomicU64,
    bytes_inflated: AtomicU64,
}

impl ImportCounters {
    fn record_blob(&self, stats: &BlobStats) {
        self.blobs_processed.fetch_add(1, Ordering::Relaxed);
        self.record_partial(stats);
        metrics::increment("import_blobs_total", 1);
    }

    /// Count what a failed blob wrote before it stopped.
    fn record_partial(&self, stats: &BlobStats) {
        self.records_imported
            .fetch_add(stats.records as u64, Ordering::Relaxed);
        self.records_skipped
            .fetch_add(stats.skipped as u64, Ordering::Relaxed);
        self.bytes_compressed
            .fetch_add(stats.compressed_bytes as u64, Ordering::Relaxed);
        self.bytes_inflated
            .fetch_add(stats.inflated_bytes as u64, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.blobs_failed.fetch_add(1, Ordering::Relaxed);
        metrics::increment("import_blobs_failed_total", 1);
    }
}

/// Something a worker can name in its log lines.
trait Named {
    fn label(&self) -> &str;
}

impl Named for WorkItem {
    fn label(&self) -> &str {
        self.name()
    }
}

impl Named for Blob {
    fn label(&self) -> &str {
        &self.name
    }
}

/// Imports datasets from one source into one store.
pub struct Importer {
    store: Arc<dyn DocumentStore>,
    source: BlobSource,
    config: ImportConfig,
}

impl Importer {
    pub fn new(store: Arc<dyn DocumentStore>, source: BlobSource, config: ImportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            source,
            config,
        })
    }

    /// Import `datasets` in order, dropping the database first if configured.
    ///
    /// Stops at the first dataset that cannot be imported at all; failures of
    /// single blobs are only reported.
    pub fn run(&self, datasets: &[Dataset]) -> Result<Vec<ImportReport>> {
        if self.config.drop_database {
            tracing::info!("Dropping database");
            self.store.drop_database()?;
        }

        let mut reports = Vec::with_capacity(datasets.len());
        for &dataset in datasets {
            reports.push(self.import_data_set(dataset)?);
        }
        Ok(reports)
    }

    /// Import one dataset.
    pub fn import_data_set(&self, dataset: Dataset) -> Result<ImportReport> {
        let span = tracing::info_span!("import", dataset = %dataset);
        let _enter = span.enter();
        let start = Instant::now();
        let collection = dataset.collection_name();

        if self.config.drop_collection {
            tracing::info!("Dropping collection {}", collection);
            self.store.drop_collection(collection)?;
        }

        let existing = self.store.count(collection)?;
        if existing > 0 {
            tracing::info!(
                "Collection {} already holds {} documents, skipping {}",
                collection,
                group_thousands(existing),
                dataset
            );
            return Ok(ImportReport::skipped(dataset, existing, start.elapsed()));
        }

        let cache = if dataset.needs_rank_join() {
            tracing::info!("Ensuring rank index on rankings");
            self.store.ensure_rank_index()?;
            Some(RankCache::new(
                Arc::clone(&self.store),
                self.config.cache_capacity()?,
            ))
        } else {
            None
        };

        let items = self
            .source
            .enumerate(dataset, self.config.size, self.config.limit)?;
        let blobs_total = items.remaining();

        let mut importer = BlobImporter::new(self.store.as_ref(), collection, self.config.batch_size)
            .with_malformed_lines(self.config.malformed_lines)
            .with_trailing_document(self.config.trailing_document);
        if let Some(cache) = &cache {
            importer = importer.with_cache(cache);
        }

        let counters = ImportCounters::default();
        let pools = self.config.pools;

        metrics::set_gauge("import_running", 1.0);
        let result = if self.source.is_remote() && pools.separate_threads {
            self.run_staged(items, &importer, &counters, &span)
        } else {
            let workers = if self.source.is_remote() {
                pools.download_threads
            } else {
                pools.import_threads
            };
            self.run_fused(items, workers, &importer, &counters, &span)
        };
        metrics::set_gauge("import_running", 0.0);
        result?;

        let cache_stats = cache.as_ref().map(RankCache::stats);
        if let Some(stats) = &cache_stats {
            tracing::info!(
                "Rank cache: {} hits, {} misses ({:.1}% hit rate), {} evictions",
                stats.hits,
                stats.misses,
                stats.hit_rate() * 100.0,
                stats.evictions
            );
        }

        Ok(ImportReport {
            dataset,
            collection,
            outcome: ImportOutcome::Imported,
            blobs_total,
            blobs_processed: counters.blobs_processed.load(Ordering::Relaxed),
            blobs_failed: counters.blobs_failed.load(Ordering::Relaxed),
            records_imported: counters.records_imported.load(Ordering::Relaxed),
            records_skipped: counters.records_skipped.load(Ordering::Relaxed),
            bytes_compressed: counters.bytes_compressed.load(Ordering::Relaxed),
            bytes_inflated: counters.bytes_inflated.load(Ordering::Relaxed),
            cache: cache_stats,
            elapsed: start.elapsed(),
        })
    }

    /// One pool of workers, each taking an item from claim to import.
    fn run_fused(
        &self,
        items: WorkItems,
        workers: usize,
        importer: &BlobImporter<'_>,
        counters: &ImportCounters,
        span: &Span,
    ) -> Result<()> {
        let queue = WorkQueue::bounded(workers * QUEUE_DEPTH_PER_WORKER);
        let prefix = if self.source.is_remote() { "worker" } else { "import" };

        let process = |item: WorkItem| -> Result<()> {
            let blob = match item {
                WorkItem::Blob(blob) => blob,
                WorkItem::Remote(key) => self.fetch(&key)?,
            };
            import_blob(importer, &blob, counters)
        };

        thread::scope(|scope| {
            let outcome = spawn_workers(scope, prefix, workers, &queue, span, counters, &process)
                .and_then(|()| feed(items, &queue, counters));

            queue.close();
            queue.join();
            outcome
        })
    }

    /// Fetchers feeding importers through a second queue.
    fn run_staged(
        &self,
        items: WorkItems,
        importer: &BlobImporter<'_>,
        counters: &ImportCounters,
        span: &Span,
    ) -> Result<()> {
        let pools = self.config.pools;
        let fetch_queue = WorkQueue::bounded(pools.download_threads * QUEUE_DEPTH_PER_WORKER);
        let import_queue = WorkQueue::bounded(pools.import_threads * QUEUE_DEPTH_PER_WORKER);

        let fetch = |item: WorkItem| -> Result<()> {
            let blob = match item {
                WorkItem::Blob(blob) => blob,
                WorkItem::Remote(key) => self.fetch(&key)?,
            };
            import_queue.put(blob)
        };

        let import = |blob: Blob| -> Result<()> {
            import_blob(importer, &blob, counters)
        };

        thread::scope(|scope| {
            let outcome = spawn_workers(
                scope,
                "fetch",
                pools.download_threads,
                &fetch_queue,
                span,
                counters,
                &fetch,
            )
            .and_then(|()| {
                spawn_workers(
                    scope,
                    "import",
                    pools.import_threads,
                    &import_queue,
                    span,
                    counters,
                    &import,
                )
            })
            .and_then(|()| feed(items, &fetch_queue, counters));

            // Fetchers put before acknowledging, so once the fetch queue is
            // joined every blob is already counted on the import queue.
            fetch_queue.close();
            fetch_queue.join();
            import_queue.close();
            import_queue.join();
            outcome
        })
    }

    fn fetch(&self, key: &ObjectKey) -> Result<Blob> {
        match &self.source {
            BlobSource::Remote { store, .. } => fetch_blob(store.as_ref(), key),
            BlobSource::Local { .. } => Err(Error::Config(format!(
                "cannot fetch {} from a local source",
                key.key
            ))),
        }
    }
}

/// Import one blob, counting its records even when it fails partway.
fn import_blob(importer: &BlobImporter<'_>, blob: &Blob, counters: &ImportCounters) -> Result<()> {
    match importer.import(blob) {
        Ok(stats) => {
            counters.record_blob(&stats);
            Ok(())
        }
        Err(failure) => {
            counters.record_partial(&failure.stats);
            Err(failure.error)
        }
    }
}

/// Put every enumerated item on the queue. Items that cannot be read are
/// counted as failed.
fn feed(items: WorkItems, queue: &WorkQueue<WorkItem>, counters: &ImportCounters) -> Result<()> {
    for item in items {
        match item {
            Ok(item) => queue.put(item)?,
            Err(e) => {
                tracing::error!("Failed to read blob: {}", e);
                counters.record_failure();
            }
        }
    }
    Ok(())
}

/// Spawn `count` named workers draining `queue` through `handler`.
///
/// Every claimed item is acknowledged, whether the handler succeeded, failed
/// or panicked.
fn spawn_workers<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    prefix: &str,
    count: usize,
    queue: &'env WorkQueue<T>,
    span: &'env Span,
    counters: &'env ImportCounters,
    handler: &'env F,
) -> Result<()>
where
    T: Named + Send + 'env,
    F: Fn(T) -> Result<()> + Sync,
{
    for id in 0..count {
        thread::Builder::new()
            .name(format!("{prefix}-{id}"))
            .spawn_scoped(scope, move || {
                let _enter = span.enter();
                while let Some(item) = queue.claim() {
                    let name = item.label().to_string();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(item)))
                        .unwrap_or_else(|payload| Err(Error::WorkerPanicked(panic_message(&*payload))));

                    if let Err(e) = result {
                        tracing::error!("Failed to import {}: {}", name, e);
                        counters.record_failure();
                    }
                    queue.task_done();
                }
                tracing::debug!("Worker exiting");
            })?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
