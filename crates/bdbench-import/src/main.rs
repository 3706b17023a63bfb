//! Big Data Benchmark loader.
//!
//! Imports the `rankings`, `uservisits` and `crawl` datasets into MongoDB,
//! either straight from the public S3 bucket or from previously downloaded
//! `.deflate` files.
//!
//! # Usage
//!
//! ```bash
//! # Import the tiny tier from S3 with 4 download workers
//! bdbench-import --size tiny --download-threads 4 --no-sign-request
//!
//! # Separate fetch and import pools
//! bdbench-import --size 1node --separate-threads \
//!     --download-threads 8 --import-threads 2
//!
//! # Re-import from local files into a fresh database
//! bdbench-import --local-files --data-dir ./data --drop-db
//! ```
//!
//! Datasets whose collection already holds documents are skipped unless
//! `--drop-collection` or `--drop-db` is given. Missing local data or invalid
//! settings exit with status 2.

use anyhow::{Context, Result};
use bdbench_core::metrics::{init_metrics, start_metrics_server};
use bdbench_core::{DEFAULT_DATABASE, MalformedLines, SizeTier, TrailingDocument};
use bdbench_import::{
    BlobSource, DatasetSelection, DocumentStore, ImportConfig, Importer, MemoryStore,
    MongoConfig, MongoStore, PoolConfig, S3Config, S3ObjectStore,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Big Data Benchmark loader.
#[derive(Parser, Debug)]
#[command(name = "bdbench-import")]
#[command(about = "Import the Big Data Benchmark datasets into MongoDB")]
#[command(version)]
struct Args {
    /// Dataset size tier: tiny, 1node (mid) or 5nodes (large)
    #[arg(long, default_value = "tiny")]
    size: SizeTier,

    /// Read previously downloaded files instead of S3
    #[arg(long)]
    local_files: bool,

    /// Root of the local cache (<data-dir>/<size>/<dataset>/*.deflate)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// S3 bucket holding the datasets
    #[arg(long, default_value = "big-data-benchmark")]
    s3_bucket: String,

    /// Key prefix of the text datasets in the bucket
    #[arg(long, default_value = "pavlo/text-deflate")]
    s3_prefix: String,

    /// Send unsigned S3 requests (the benchmark bucket is public)
    #[arg(long)]
    no_sign_request: bool,

    /// Download workers (fused with import unless --separate-threads)
    #[arg(long, default_value = "1")]
    download_threads: usize,

    /// Import workers
    #[arg(long, default_value = "1")]
    import_threads: usize,

    /// Run downloads and imports in separate pools
    #[arg(long)]
    separate_threads: bool,

    /// Documents per bulk insert
    #[arg(long, default_value = "500")]
    batch_size: usize,

    /// Entries in the page rank lookup cache
    #[arg(long, default_value = "10000")]
    cache_capacity: usize,

    /// Skip the rankings dataset
    #[arg(long)]
    skip_rankings: bool,

    /// Skip the uservisits dataset
    #[arg(long)]
    skip_uservisits: bool,

    /// Skip the crawl dataset
    #[arg(long)]
    skip_crawls: bool,

    /// Import only the uservisits dataset
    #[arg(long)]
    only_uservisits: bool,

    /// Drop the database before importing
    #[arg(long)]
    drop_db: bool,

    /// Drop each collection before importing into it
    #[arg(long)]
    drop_collection: bool,

    /// Skip malformed lines instead of failing the blob
    #[arg(long)]
    skip_malformed: bool,

    /// Discard the last crawl page of each blob (legacy behavior)
    #[arg(long)]
    drop_trailing_document: bool,

    /// Cap on blobs per dataset
    #[arg(long)]
    limit: Option<usize>,

    /// Debug logging for the loader
    #[arg(long, short)]
    verbose: bool,

    /// MongoDB host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MongoDB port
    #[arg(long, default_value = "27017")]
    port: u16,

    /// MongoDB database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Import into memory instead of MongoDB and report counts
    #[arg(long)]
    dry_run: bool,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

impl Args {
    fn import_config(&self) -> ImportConfig {
        ImportConfig {
            size: self.size,
            pools: PoolConfig {
                download_threads: self.download_threads,
                import_threads: self.import_threads,
                separate_threads: self.separate_threads,
            },
            batch_size: self.batch_size,
            cache_capacity: self.cache_capacity,
            drop_collection: self.drop_collection,
            drop_database: self.drop_db,
            malformed_lines: if self.skip_malformed {
                MalformedLines::Skip
            } else {
                MalformedLines::Abort
            },
            trailing_document: if self.drop_trailing_document {
                TrailingDocument::Drop
            } else {
                TrailingDocument::Emit
            },
            limit: self.limit,
        }
    }

    fn selection(&self) -> DatasetSelection {
        DatasetSelection {
            skip_rankings: self.skip_rankings,
            skip_uservisits: self.skip_uservisits,
            skip_crawls: self.skip_crawls,
            only_uservisits: self.only_uservisits,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "info,bdbench_import=debug,bdbench_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_thread_names(true)
        .init();

    tracing::info!("Big Data Benchmark loader starting ({} tier)", args.size);

    let config = args.import_config();
    config.validate()?;

    // Drives the S3 client and the metrics server. Workers are plain threads
    // and reach it through a handle, so main itself stays synchronous.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("runtime")
        .build()
        .context("Failed to build tokio runtime")?;

    if args.metrics_port > 0 {
        let handle = init_metrics();
        runtime
            .block_on(start_metrics_server(args.metrics_port, handle))
            .context("Failed to start metrics server")?;
    }

    let store: Arc<dyn DocumentStore> = if args.dry_run {
        tracing::info!("Dry run: importing into memory");
        Arc::new(MemoryStore::new())
    } else {
        let mongo = MongoConfig {
            host: args.host.clone(),
            port: args.port,
            database: args.database.clone(),
        };
        Arc::new(
            MongoStore::connect(&mongo)
                .with_context(|| format!("Failed to connect to {}", mongo.uri()))?,
        )
    };

    let source = if args.local_files {
        BlobSource::Local {
            root: args.data_dir.clone(),
        }
    } else {
        let s3 = S3Config {
            bucket: args.s3_bucket.clone(),
            anonymous: args.no_sign_request,
            ..Default::default()
        };
        BlobSource::Remote {
            store: Arc::new(S3ObjectStore::connect(&s3, runtime.handle().clone())),
            prefix: args.s3_prefix.clone(),
        }
    };

    let datasets = args.selection().datasets();
    if datasets.is_empty() {
        tracing::warn!("No datasets selected, nothing to do");
        return Ok(());
    }

    let importer = Importer::new(Arc::clone(&store), source, config)?;
    let reports = match importer.run(&datasets) {
        Ok(reports) => reports,
        Err(e) if e.is_precondition() => {
            tracing::error!("Cannot import: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Import failed"),
    };

    tracing::info!("Import finished");
    let mut incomplete = 0;
    for report in &reports {
        let count = match store.count(report.collection) {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Failed to count {}: {}", report.collection, e);
                None
            }
        };
        report.log_summary(count);
        if !report.is_complete() {
            incomplete += 1;
        }
    }
    if incomplete > 0 {
        tracing::warn!("{} dataset(s) had failed blobs, see errors above", incomplete);
    }

    Ok(())
}
