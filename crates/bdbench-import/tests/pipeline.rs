//! End-to-end imports against the in-memory store.

use bdbench_core::{Dataset, Ranking, Record, SizeTier, TrailingDocument};
use bdbench_import::{
    BlobSource, DocumentStore, Error, ImportConfig, ImportOutcome, Importer, MemoryStore,
    ObjectStore, PoolConfig, RemoteObject, Result,
};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn deflate(text: &str) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn write_local(root: &Path, size: &str, dataset: &str, name: &str, text: &str) {
    let dir = root.join(size).join(dataset);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), deflate(text)).unwrap();
}

fn local(root: &Path) -> BlobSource {
    BlobSource::Local {
        root: root.to_path_buf(),
    }
}

/// Object store backed by a map, optionally slow or faulty per key.
#[derive(Default)]
struct FakeObjectStore {
    objects: BTreeMap<String, Vec<u8>>,
    delay: Duration,
    fail: Vec<String>,
    panic: Vec<String>,
    gets: AtomicUsize,
}

impl FakeObjectStore {
    fn with_rankings(count: usize) -> Self {
        let mut store = Self::default();
        for i in 0..count {
            store.objects.insert(
                format!("pavlo/text-deflate/tiny/rankings/{i:06}_0.deflate"),
                deflate(&format!("page{i}.com,{i},1\n")),
            );
        }
        store
    }
}

impl ObjectStore for FakeObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        Ok(self
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, bytes)| RemoteObject {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail.iter().any(|k| key.ends_with(k.as_str())) {
            return Err(Error::S3(format!("connection reset fetching {key}")));
        }
        if self.panic.iter().any(|k| key.ends_with(k.as_str())) {
            panic!("fetch of {key} blew up");
        }
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::S3(format!("no such key {key}")))
    }
}

fn remote(store: Arc<FakeObjectStore>) -> BlobSource {
    BlobSource::Remote {
        store,
        prefix: "pavlo/text-deflate".to_string(),
    }
}

fn pools(download_threads: usize, import_threads: usize, separate_threads: bool) -> ImportConfig {
    ImportConfig {
        pools: PoolConfig {
            download_threads,
            import_threads,
            separate_threads,
        },
        ..Default::default()
    }
}

#[test]
fn test_local_rankings_end_to_end() {
    let tmp = TempDir::new().unwrap();
    write_local(tmp.path(), "tiny", "rankings", "000000_0.deflate", "a.com,10,5\nb.com,20,8\n");

    let store = Arc::new(MemoryStore::new());
    let importer = Importer::new(store.clone(), local(tmp.path()), ImportConfig::default()).unwrap();
    let report = importer.import_data_set(Dataset::Rankings).unwrap();

    assert_eq!(report.records_imported, 2);
    assert_eq!(
        store.records("rankings"),
        vec![
            Record::Ranking(Ranking {
                page_url: "a.com".to_string(),
                page_rank: 10,
                avg_duration: 5,
            }),
            Record::Ranking(Ranking {
                page_url: "b.com".to_string(),
                page_rank: 20,
                avg_duration: 8,
            }),
        ]
    );
}

#[test]
fn test_non_empty_collection_issues_no_writes() {
    let tmp = TempDir::new().unwrap();
    write_local(tmp.path(), "tiny", "rankings", "000000_0.deflate", "a.com,10,5\n");

    let store = Arc::new(MemoryStore::new());
    store
        .insert_many(
            "rankings",
            &[Record::Ranking(Ranking {
                page_url: "existing.com".to_string(),
                page_rank: 1,
                avg_duration: 1,
            })],
        )
        .unwrap();
    let calls = store.insert_calls();

    let importer = Importer::new(store.clone(), local(tmp.path()), ImportConfig::default()).unwrap();
    let report = importer.import_data_set(Dataset::Rankings).unwrap();

    assert_eq!(report.outcome, ImportOutcome::Skipped { existing: 1 });
    assert_eq!(store.insert_calls(), calls);
    assert!(store.get("rankings", "a.com").is_none());
}

#[test]
fn test_all_datasets_from_local_files() {
    let tmp = TempDir::new().unwrap();
    write_local(tmp.path(), "1node", "rankings", "r0.deflate", "a.com,10,5\nb.com,20,8\n");
    write_local(
        tmp.path(),
        "1node",
        "uservisits",
        "v0.deflate",
        "1.1.1.1,b.com,1980-01-01,0.5,UA,NLD,NL,x,3\n\
         2.2.2.2,b.com,1980-01-02,1.5,UA,DEU,DE,y,4\n\
         3.3.3.3,a.com,1980-01-03,2.5,UA,FRA,FR,z,5\n",
    );
    write_local(
        tmp.path(),
        "1node",
        "crawl",
        "c0.deflate",
        "http://a.com/ 1 2 3 4\n<html>\n</html>\nhttp://b.com/ 1 2 3 4\n<p>b</p>\n",
    );

    let store = Arc::new(MemoryStore::new());
    let config = ImportConfig {
        size: SizeTier::OneNode,
        ..pools(1, 2, false)
    };
    let reports = Importer::new(store.clone(), local(tmp.path()), config)
        .unwrap()
        .run(&Dataset::ALL)
        .unwrap();

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.is_complete()));
    assert_eq!(store.count("rankings").unwrap(), 2);
    assert_eq!(store.count("uservisits").unwrap(), 3);
    assert_eq!(store.count("documents").unwrap(), 2);

    for record in store.records("uservisits") {
        let Record::UserVisit(visit) = record else {
            panic!("expected a visit");
        };
        let expected = if visit.dest_url == "a.com" { 10 } else { 20 };
        assert_eq!(visit.page_rank, Some(expected));
    }
    // b.com looked up once, a.com once.
    assert_eq!(store.rank_lookups(), 2);
    assert!(store.has_rank_index());

    let Some(Record::Crawl(doc)) = store.get("documents", "http://b.com/") else {
        panic!("expected the trailing crawl document");
    };
    assert_eq!(doc.html, "<p>b</p>");
}

#[test]
fn test_trailing_document_dropped_on_request() {
    let tmp = TempDir::new().unwrap();
    write_local(
        tmp.path(),
        "tiny",
        "crawl",
        "c0.deflate",
        "http://a.com/ 1 2 3 4\n<html>a</html>\n",
    );

    let store = Arc::new(MemoryStore::new());
    let config = ImportConfig {
        trailing_document: TrailingDocument::Drop,
        ..Default::default()
    };
    let report = Importer::new(store.clone(), local(tmp.path()), config)
        .unwrap()
        .import_data_set(Dataset::Crawl)
        .unwrap();

    assert_eq!(report.records_imported, 0);
    assert_eq!(store.count("documents").unwrap(), 0);
}

#[test]
fn test_missing_local_data_aborts_run() {
    let tmp = TempDir::new().unwrap();
    write_local(tmp.path(), "tiny", "rankings", "r0.deflate", "a.com,10,5\n");

    let store = Arc::new(MemoryStore::new());
    let err = Importer::new(store.clone(), local(tmp.path()), ImportConfig::default())
        .unwrap()
        .run(&Dataset::ALL)
        .unwrap_err();

    assert!(matches!(err, Error::NoDataFound { .. }));
    assert!(err.is_precondition());
    // Rankings went in before uservisits was found missing.
    assert_eq!(store.count("rankings").unwrap(), 1);
}

#[test]
fn test_staged_pools_process_every_item() {
    const ITEMS: usize = 40;

    let objects = Arc::new(FakeObjectStore {
        delay: Duration::from_millis(2),
        ..FakeObjectStore::with_rankings(ITEMS)
    });
    let store = Arc::new(MemoryStore::new());

    let report = Importer::new(store.clone(), remote(objects.clone()), pools(4, 1, true))
        .unwrap()
        .import_data_set(Dataset::Rankings)
        .unwrap();

    assert_eq!(report.blobs_total, ITEMS);
    assert_eq!(report.blobs_processed, ITEMS);
    assert_eq!(report.blobs_failed, 0);
    assert_eq!(objects.gets.load(Ordering::SeqCst), ITEMS);
    assert_eq!(store.count("rankings").unwrap(), ITEMS as u64);
}

#[test]
fn test_fused_pool_process_every_item() {
    const ITEMS: usize = 25;

    let objects = Arc::new(FakeObjectStore::with_rankings(ITEMS));
    let store = Arc::new(MemoryStore::new());

    let report = Importer::new(store.clone(), remote(objects.clone()), pools(3, 1, false))
        .unwrap()
        .import_data_set(Dataset::Rankings)
        .unwrap();

    assert_eq!(report.blobs_processed, ITEMS);
    assert_eq!(store.count("rankings").unwrap(), ITEMS as u64);
}

#[test]
fn test_remote_limit() {
    let objects = Arc::new(FakeObjectStore::with_rankings(10));
    let store = Arc::new(MemoryStore::new());
    let config = ImportConfig {
        limit: Some(4),
        ..pools(2, 2, true)
    };

    let report = Importer::new(store.clone(), remote(objects), config)
        .unwrap()
        .import_data_set(Dataset::Rankings)
        .unwrap();

    assert_eq!(report.blobs_total, 4);
    assert_eq!(store.count("rankings").unwrap(), 4);
}

#[test]
fn test_fetch_failures_are_counted_and_do_not_hang() {
    const ITEMS: usize = 12;

    let objects = Arc::new(FakeObjectStore {
        fail: vec!["000003_0.deflate".to_string()],
        panic: vec!["000007_0.deflate".to_string()],
        ..FakeObjectStore::with_rankings(ITEMS)
    });
    let store = Arc::new(MemoryStore::new());

    for separate in [true, false] {
        store.drop_database().unwrap();
        let report = Importer::new(store.clone(), remote(objects.clone()), pools(4, 2, separate))
            .unwrap()
            .import_data_set(Dataset::Rankings)
            .unwrap();

        assert_eq!(report.blobs_failed, 2, "separate={separate}");
        assert_eq!(report.blobs_processed, ITEMS - 2, "separate={separate}");
        assert!(!report.is_complete());
        assert_eq!(store.count("rankings").unwrap(), (ITEMS - 2) as u64);
    }
}

#[test]
fn test_empty_remote_listing_imports_nothing() {
    let objects = Arc::new(FakeObjectStore::default());
    let store = Arc::new(MemoryStore::new());

    let report = Importer::new(store.clone(), remote(objects), pools(2, 2, true))
        .unwrap()
        .import_data_set(Dataset::Crawl)
        .unwrap();

    assert_eq!(report.outcome, ImportOutcome::Imported);
    assert_eq!(report.blobs_total, 0);
    assert_eq!(store.insert_calls(), 0);
}
