//! Local cache files.

use super::Blob;
use crate::{Error, Result};
use bdbench_core::{Dataset, SizeTier};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of cached partitions.
const BLOB_EXTENSION: &str = "deflate";

/// List `<root>/<size>/<dataset>/*.deflate`, sorted by name.
pub(super) fn list_files(
    root: &Path,
    dataset: Dataset,
    size: SizeTier,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let dir = root.join(size.dir_name()).join(dataset.dir_name());

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NoDataFound { path: dir });
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == BLOB_EXTENSION) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(Error::NoDataFound { path: dir });
    }

    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    Ok(files)
}

/// Read one cache file whole.
pub(super) fn read_blob(path: &Path, dataset: Dataset) -> Result<Blob> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::debug!("Read {} ({} bytes)", path.display(), bytes.len());

    Ok(Blob {
        name,
        dataset,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BlobSource, WorkItem};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tiny").join("rankings");
        write(&dir, "000001_0.deflate", b"b");
        write(&dir, "000000_0.deflate", b"a");
        write(&dir, "_SUCCESS", b"");
        write(&dir, "notes.txt", b"x");

        let files = list_files(tmp.path(), Dataset::Rankings, SizeTier::Tiny, None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["000000_0.deflate", "000001_0.deflate"]);
    }

    #[test]
    fn test_list_files_missing_dir_is_no_data() {
        let tmp = TempDir::new().unwrap();
        let err = list_files(tmp.path(), Dataset::Crawl, SizeTier::FiveNodes, None).unwrap_err();
        match err {
            Error::NoDataFound { path } => assert!(path.ends_with("5nodes/crawl")),
            other => panic!("expected NoDataFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_files_empty_dir_is_no_data() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tiny").join("uservisits");
        write(&dir, "readme.md", b"");

        let err = list_files(tmp.path(), Dataset::UserVisits, SizeTier::Tiny, None).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_list_files_limit() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tiny").join("rankings");
        for i in 0..5 {
            write(&dir, &format!("{i:06}_0.deflate"), b"x");
        }
        let files = list_files(tmp.path(), Dataset::Rankings, SizeTier::Tiny, Some(3)).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_local_source_yields_blobs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tiny").join("crawl");
        write(&dir, "part.deflate", b"bytes");

        let source = BlobSource::Local {
            root: tmp.path().to_path_buf(),
        };
        let mut items = source.enumerate(Dataset::Crawl, SizeTier::Tiny, None).unwrap();
        assert_eq!(items.remaining(), 1);

        match items.next().unwrap().unwrap() {
            WorkItem::Blob(blob) => {
                assert_eq!(blob.name, "part.deflate");
                assert_eq!(blob.dataset, Dataset::Crawl);
                assert_eq!(blob.bytes, b"bytes");
            }
            other => panic!("expected a blob, got {:?}", other),
        }
        assert!(items.next().is_none());
    }
}
