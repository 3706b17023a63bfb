//! In-process document store.
//!
//! Mirrors the MongoDB semantics the importer relies on (ordered inserts that
//! stop at the first duplicate `_id`, point rank lookups) and counts the calls
//! made against it so tests can assert on round trips.

use super::{DocumentStore, RANKINGS_COLLECTION};
use crate::{Error, Result};
use bdbench_core::Record;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory collections keyed by `_id`.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Record>>>,
    rank_index: AtomicBool,
    insert_calls: AtomicUsize,
    rank_lookups: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of a collection, ordered by `_id`.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .lock()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One record by `_id`.
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|c| c.get(id).cloned())
    }

    /// Number of `insert_many` calls issued.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }

    /// Number of `find_page_rank` calls issued.
    pub fn rank_lookups(&self) -> usize {
        self.rank_lookups.load(Ordering::Relaxed)
    }

    /// Whether `ensure_rank_index` has been called.
    pub fn has_rank_index(&self) -> bool {
        self.rank_index.load(Ordering::Relaxed)
    }
}

impl DocumentStore for MemoryStore {
    fn count(&self, collection: &str) -> Result<u64> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map_or(0, |c| c.len() as u64))
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.lock().remove(collection);
        if collection == RANKINGS_COLLECTION {
            self.rank_index.store(false, Ordering::Relaxed);
        }
        Ok(())
    }

    fn drop_database(&self) -> Result<()> {
        self.collections.lock().clear();
        self.rank_index.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn ensure_rank_index(&self) -> Result<()> {
        self.rank_index.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn insert_many(&self, collection: &str, records: &[Record]) -> Result<usize> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);

        let mut collections = self.collections.lock();
        let target = collections.entry(collection.to_string()).or_default();

        for (inserted, record) in records.iter().enumerate() {
            if target.contains_key(record.id()) {
                return Err(Error::DuplicateKey {
                    collection: collection.to_string(),
                    inserted,
                    message: format!("duplicate _id '{}'", record.id()),
                });
            }
            target.insert(record.id().to_string(), record.clone());
        }

        Ok(records.len())
    }

    fn find_page_rank(&self, url: &str) -> Result<Option<i32>> {
        self.rank_lookups.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .collections
            .lock()
            .get(RANKINGS_COLLECTION)
            .and_then(|c| c.get(url))
            .and_then(|record| match record {
                Record::Ranking(r) => Some(r.page_rank),
                _ => None,
            }))
    }
}
