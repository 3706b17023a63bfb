//! Per-blob import: inflate, parse, join, batch-insert.

use super::batcher::WriteBatcher;
use super::cache::RankCache;
use crate::source::Blob;
use crate::store::DocumentStore;
use crate::{Error, Result};
use bdbench_core::format::{human_bytes, per_second};
use bdbench_core::inflate::inflate;
use bdbench_core::{MalformedLines, Record, TrailingDocument, metrics, parse_records};
use std::time::Instant;

/// Outcome of importing one blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobStats {
    /// Documents written.
    pub records: usize,
    /// Malformed lines skipped.
    pub skipped: usize,
    /// Lines read from the inflated text.
    pub lines: usize,
    pub compressed_bytes: usize,
    pub inflated_bytes: usize,
}

/// A blob that could not be fully imported.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct BlobFailure {
    #[source]
    pub error: Error,
    /// What was read and written before the failure.
    pub stats: BlobStats,
}

/// Imports whole blobs into one collection.
pub struct BlobImporter<'a> {
    store: &'a dyn DocumentStore,
    cache: Option<&'a RankCache>,
    collection: &'a str,
    batch_size: usize,
    malformed_lines: MalformedLines,
    trailing_document: TrailingDocument,
}

impl<'a> BlobImporter<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str, batch_size: usize) -> Self {
        Self {
            store,
            cache: None,
            collection,
            batch_size,
            malformed_lines: MalformedLines::default(),
            trailing_document: TrailingDocument::default(),
        }
    }

    /// Resolve visit ranks through `cache`.
    pub fn with_cache(mut self, cache: &'a RankCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_malformed_lines(mut self, policy: MalformedLines) -> Self {
        self.malformed_lines = policy;
        self
    }

    pub fn with_trailing_document(mut self, policy: TrailingDocument) -> Self {
        self.trailing_document = policy;
        self
    }

    /// Import one blob.
    ///
    /// Under [`MalformedLines::Abort`] the first bad line fails the blob;
    /// batches flushed before it stay written and are counted in the
    /// failure's stats.
    pub fn import(&self, blob: &Blob) -> std::result::Result<BlobStats, BlobFailure> {
        let mut stats = BlobStats {
            compressed_bytes: blob.bytes.len(),
            ..Default::default()
        };

        let start = Instant::now();
        let text = inflate(&blob.bytes).map_err(|e| BlobFailure {
            error: e.into(),
            stats,
        })?;
        tracing::debug!(
            "Inflated {} from {} to {} in {:.2}s",
            blob.name,
            human_bytes(blob.bytes.len() as f64),
            human_bytes(text.len() as f64),
            start.elapsed().as_secs_f64()
        );
        stats.inflated_bytes = text.len();

        let import_start = Instant::now();
        let mut batcher = WriteBatcher::new(self.store, self.collection, self.batch_size);
        let outcome = self.write_records(blob, &text, &mut batcher, &mut stats);
        stats.records = batcher.stats().written;

        metrics::record_bytes("import_bytes_total", "compressed", stats.compressed_bytes as u64);
        metrics::record_bytes("import_bytes_total", "inflated", stats.inflated_bytes as u64);
        metrics::increment("import_records_total", stats.records as u64);
        metrics::increment("import_records_skipped_total", stats.skipped as u64);

        if let Err(error) = outcome {
            return Err(BlobFailure { error, stats });
        }

        let elapsed = import_start.elapsed();
        tracing::info!(
            "Imported {} {} records from {} in {:.2}s ({:.0} records/s)",
            stats.records,
            blob.dataset,
            blob.name,
            elapsed.as_secs_f64(),
            per_second(stats.records as f64, elapsed)
        );

        Ok(stats)
    }

    fn write_records(
        &self,
        blob: &Blob,
        text: &str,
        batcher: &mut WriteBatcher<'_>,
        stats: &mut BlobStats,
    ) -> Result<()> {
        let mut records = parse_records(blob.dataset, text, self.trailing_document);

        while let Some(parsed) = records.next() {
            let mut record = match parsed {
                Ok(record) => record,
                Err(e) => match self.malformed_lines {
                    MalformedLines::Abort => {
                        stats.lines = records.lines_read();
                        return Err(e.into());
                    }
                    MalformedLines::Skip => {
                        tracing::warn!("Skipping line in {}: {}", blob.name, e);
                        stats.skipped += 1;
                        continue;
                    }
                },
            };

            if let Record::UserVisit(visit) = &mut record {
                visit.page_rank = Some(self.page_rank(&visit.dest_url)?);
            }

            batcher.insert(record)?;
        }
        batcher.flush()?;

        stats.lines = records.lines_read();
        Ok(())
    }

    fn page_rank(&self, url: &str) -> Result<i32> {
        match self.cache {
            Some(cache) => cache.get_or_load(url),
            None => self
                .store
                .find_page_rank(url)?
                .ok_or_else(|| Error::JoinKeyNotFound {
                    url: url.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bdbench_core::{Dataset, Ranking};
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    fn blob(dataset: Dataset, text: &str) -> Blob {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        Blob {
            name: "000000_0.deflate".to_string(),
            dataset,
            bytes: encoder.finish().unwrap(),
        }
    }

    fn visit_line(dest: &str) -> String {
        format!("1.2.3.4,{dest},1980-01-30,0.5,Mozilla,NLD,NL,rust,3\n")
    }

    fn seed_ranks(store: &MemoryStore, ranks: &[(&str, i32)]) {
        let records: Vec<Record> = ranks
            .iter()
            .map(|(url, rank)| {
                Record::Ranking(Ranking {
                    page_url: url.to_string(),
                    page_rank: *rank,
                    avg_duration: 1,
                })
            })
            .collect();
        store.insert_many("rankings", &records).unwrap();
    }

    #[test]
    fn test_import_rankings() {
        let store = MemoryStore::new();
        let importer = BlobImporter::new(&store, "rankings", 500);

        let stats = importer
            .import(&blob(Dataset::Rankings, "a.com,10,5\nb.com,20,8\n"))
            .unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.lines, 2);
        assert_eq!(
            store.get("rankings", "b.com"),
            Some(Record::Ranking(Ranking {
                page_url: "b.com".to_string(),
                page_rank: 20,
                avg_duration: 8,
            }))
        );
    }

    #[test]
    fn test_malformed_line_aborts_blob() {
        let store = MemoryStore::new();
        let importer = BlobImporter::new(&store, "rankings", 1);

        let err = importer
            .import(&blob(Dataset::Rankings, "a.com,10,5\nb.com,oops,8\nc.com,1,1\n"))
            .unwrap_err();
        assert!(matches!(err.error, Error::Record(_)));
        // The batch flushed before the bad line stays written and is counted.
        assert_eq!(store.count("rankings").unwrap(), 1);
        assert_eq!(err.stats.records, 1);
        assert_eq!(err.stats.lines, 2);
    }

    #[test]
    fn test_malformed_line_skipped() {
        let store = MemoryStore::new();
        let importer = BlobImporter::new(&store, "rankings", 500)
            .with_malformed_lines(MalformedLines::Skip);

        let stats = importer
            .import(&blob(Dataset::Rankings, "a.com,10,5\nbroken\nc.com,1,1\n"))
            .unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_visits_joined_through_cache() {
        let store = Arc::new(MemoryStore::new());
        seed_ranks(&store, &[("a.com", 10), ("b.com", 20)]);
        let cache = RankCache::new(store.clone(), NonZeroUsize::new(16).unwrap());
        let importer = BlobImporter::new(store.as_ref(), "uservisits", 500).with_cache(&cache);

        let text = [visit_line("a.com"), visit_line("b.com"), visit_line("a.com")].concat();
        let stats = importer.import(&blob(Dataset::UserVisits, &text)).unwrap();
        assert_eq!(stats.records, 3);

        let visits = store.records("uservisits");
        assert_eq!(visits.len(), 3);
        for record in visits {
            match record {
                Record::UserVisit(v) => {
                    let expected = if v.dest_url == "a.com" { 10 } else { 20 };
                    assert_eq!(v.page_rank, Some(expected));
                }
                other => panic!("expected a visit, got {:?}", other),
            }
        }
        assert_eq!(store.rank_lookups(), 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_visit_without_rank_fails() {
        let store = MemoryStore::new();
        let importer = BlobImporter::new(&store, "uservisits", 500);

        let err = importer
            .import(&blob(Dataset::UserVisits, &visit_line("unranked.com")))
            .unwrap_err();
        assert!(matches!(err.error, Error::JoinKeyNotFound { .. }));
        assert_eq!(err.stats.records, 0);
        assert_eq!(store.count("uservisits").unwrap(), 0);
    }

    #[test]
    fn test_crawl_trailing_document_policies() {
        let text = "http://a.com/ 1 2 3 4\n<html>a</html>\nhttp://b.com/ 1 2 3 4\n<html>b</html>\n";

        let store = MemoryStore::new();
        let stats = BlobImporter::new(&store, "documents", 500)
            .import(&blob(Dataset::Crawl, text))
            .unwrap();
        assert_eq!(stats.records, 2);

        let store = MemoryStore::new();
        let stats = BlobImporter::new(&store, "documents", 500)
            .with_trailing_document(TrailingDocument::Drop)
            .import(&blob(Dataset::Crawl, text))
            .unwrap();
        assert_eq!(stats.records, 1);
        assert!(store.get("documents", "http://a.com/").is_some());
    }

    #[test]
    fn test_corrupt_blob_fails() {
        let store = MemoryStore::new();
        let importer = BlobImporter::new(&store, "rankings", 500);
        let corrupt = Blob {
            name: "bad.deflate".to_string(),
            dataset: Dataset::Rankings,
            bytes: b"not deflated".to_vec(),
        };
        let err = importer.import(&corrupt).unwrap_err();
        assert_eq!(err.stats.compressed_bytes, corrupt.bytes.len());
        assert_eq!(err.stats.inflated_bytes, 0);
        assert_eq!(store.insert_calls(), 0);
    }
}
