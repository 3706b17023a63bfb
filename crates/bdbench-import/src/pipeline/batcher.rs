//! Bulk write batching.

use crate::store::DocumentStore;
use crate::{Error, Result};
use bdbench_core::{Record, metrics};
use std::mem;

/// Counters for one batcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Bulk inserts issued.
    pub flushes: usize,
    /// Documents the store accepted.
    pub written: usize,
    /// Flushes that stopped at a duplicate key.
    pub duplicate_batches: usize,
}

/// Buffers records and writes them to one collection in bulk.
///
/// The buffer is cleared on every flush, whether or not the write succeeded.
pub struct WriteBatcher<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
    batch_size: usize,
    buffer: Vec<Record>,
    stats: BatcherStats,
}

impl<'a> WriteBatcher<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            collection,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            stats: BatcherStats::default(),
        }
    }

    /// Buffer a record, flushing once the batch is full.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the buffered records, returning how many the store accepted.
    ///
    /// A duplicate key is logged and swallowed; the documents before it in
    /// the batch stay written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let batch = mem::take(&mut self.buffer);
        self.stats.flushes += 1;
        metrics::increment("import_batches_flushed_total", 1);

        match self.store.insert_many(self.collection, &batch) {
            Ok(written) => {
                self.stats.written += written;
                Ok(written)
            }
            Err(Error::DuplicateKey {
                inserted, message, ..
            }) => {
                tracing::warn!(
                    "Duplicate key in {} after {} of {} documents, continuing: {}",
                    self.collection,
                    inserted,
                    batch.len(),
                    message
                );
                self.stats.written += inserted;
                self.stats.duplicate_batches += 1;
                metrics::increment("import_duplicate_batches_total", 1);
                Ok(inserted)
            }
            Err(e) => Err(e),
        }
    }

    /// Records buffered and not yet written.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> BatcherStats {
        self.stats
    }
}

impl Drop for WriteBatcher<'_> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                "Discarding {} unflushed records for {}",
                self.buffer.len(),
                self.collection
            );
        }
    }
}
