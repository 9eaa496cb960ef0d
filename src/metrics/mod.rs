//! Prometheus metrics for the search engine.
//!
//! Metrics are process-wide statics that can be recorded before
//! [`init_metrics`] runs; registration only makes them visible to
//! [`gather_metrics`].
//!
//! # Example
//! ```no_run
//! use genomics_file_search::metrics::{init_metrics, gather_metrics, SEARCHES_TOTAL};
//!
//! init_metrics().expect("metrics registration");
//! SEARCHES_TOTAL.with_label_values(&["ok"]).inc();
//! println!("{}", gather_metrics());
//! ```

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use prometheus::{CounterVec, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "genomics_search";

lazy_static! {
    /// Registry holding every engine metric
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Completed searches
    ///
    /// Labels: outcome (ok, degraded, cached, failed)
    pub static ref SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("searches_total", "Total number of searches").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCHES_TOTAL metric");

    /// End-to-end search latency in seconds
    pub static ref SEARCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("search_duration_seconds", "Search duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    /// Calls made to backends
    ///
    /// Labels: backend, operation (list, get_tags)
    pub static ref BACKEND_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("backend_calls_total", "Total number of backend calls").namespace(NAMESPACE),
        &["backend", "operation"]
    ).expect("Failed to create BACKEND_CALLS_TOTAL metric");

    /// Per-search backend outcomes
    ///
    /// Labels: backend, status (ok, partial, error, timed_out)
    pub static ref BACKEND_OUTCOMES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("backend_outcomes_total", "Backend outcomes per search").namespace(NAMESPACE),
        &["backend", "status"]
    ).expect("Failed to create BACKEND_OUTCOMES_TOTAL metric");

    /// Cache lookups
    ///
    /// Labels: cache (tags, results), result (hit, miss, corrupt)
    pub static ref CACHE_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cache_lookups_total", "Total number of cache lookups").namespace(NAMESPACE),
        &["cache", "result"]
    ).expect("Failed to create CACHE_LOOKUPS_TOTAL metric");
}

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Register all metrics with [`PROMETHEUS_REGISTRY`]. Safe to call repeatedly.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTERED.get_or_try_init(|| {
        PROMETHEUS_REGISTRY.register(Box::new(SEARCHES_TOTAL.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(BACKEND_CALLS_TOTAL.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(BACKEND_OUTCOMES_TOTAL.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(CACHE_LOOKUPS_TOTAL.clone()))?;

        tracing::info!("Search metrics initialized");
        Ok::<(), prometheus::Error>(())
    })?;
    Ok(())
}

/// Render registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_includes_namespace() {
        init_metrics().unwrap();
        CACHE_LOOKUPS_TOTAL.with_label_values(&["tags", "hit"]).inc();

        let text = gather_metrics();
        assert!(text.contains("genomics_search_cache_lookups_total"));
    }

    #[test]
    fn test_record_backend_outcome() {
        BACKEND_OUTCOMES_TOTAL
            .with_label_values(&["test-backend", "ok"])
            .inc();
        let value = BACKEND_OUTCOMES_TOTAL
            .with_label_values(&["test-backend", "ok"])
            .get();
        assert!(value >= 1.0);
    }
}
