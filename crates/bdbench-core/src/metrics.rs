//! Prometheus metrics helpers for the loader.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bdbench_core::metrics::{init_metrics, start_metrics_server};
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let handle = init_metrics();
//! runtime.block_on(start_metrics_server(9091, handle))?;
//!
//! metrics::counter!("import_records_total").increment(1);
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component (`import_`, `lookup_cache_`)
//! - Suffix: unit or type (`_total`, `_bytes`, `_seconds`)
//! - Labels: only `type` on byte counters

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Returns a handle for [`start_metrics_server`].
///
/// # Panics
///
/// Panics if a recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Serve `/metrics` on `port` from a background task of the current runtime.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

fn register_metrics() {
    // =========================================================================
    // Import pipeline
    // =========================================================================

    describe_counter!("import_blobs_total", "Blobs fully imported");
    describe_counter!(
        "import_blobs_failed_total",
        "Blobs whose fetch or import failed"
    );
    describe_counter!("import_records_total", "Records written to the store");
    describe_counter!(
        "import_records_skipped_total",
        "Malformed lines skipped under the skip policy"
    );
    describe_counter!(
        "import_bytes_total",
        "Blob bytes processed (label: type=compressed|inflated)"
    );
    describe_counter!(
        "import_batches_flushed_total",
        "Bulk inserts issued by write batchers"
    );
    describe_counter!(
        "import_duplicate_batches_total",
        "Bulk inserts that hit a duplicate key"
    );
    describe_histogram!(
        "import_fetch_duration_seconds",
        "Time spent downloading one blob"
    );
    describe_gauge!(
        "import_running",
        "Whether an import is running (1=yes, 0=no)"
    );

    // =========================================================================
    // Rank lookup cache
    // =========================================================================

    describe_counter!("lookup_cache_hits_total", "Rank lookups answered from cache");
    describe_counter!(
        "lookup_cache_misses_total",
        "Rank lookups sent to the rankings collection"
    );
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Add `bytes` to a byte counter with a type label.
pub fn record_bytes(metric_name: &'static str, byte_type: &'static str, bytes: u64) {
    metrics::counter!(metric_name, "type" => byte_type).increment(bytes);
}

/// Increment a counter.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Set a gauge value.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();

        // At most one should succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_helpers_do_not_panic() {
        ensure_metrics_init();
        record_bytes("import_bytes_total", "compressed", 0);
        record_bytes("import_bytes_total", "inflated", 1024);
        increment("import_records_total", 1);
        set_gauge("import_running", 1.0);
        set_gauge("import_running", 0.0);
    }

    #[tokio::test]
    async fn test_metrics_server_binds_ephemeral_port() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        start_metrics_server(0, handle).await.unwrap();
    }

    #[test]
    fn test_register_metrics_is_repeatable() {
        ensure_metrics_init();
        register_metrics();
        register_metrics();
    }
}
