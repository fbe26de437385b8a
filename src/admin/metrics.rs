//! Prometheus metrics for load cycles.

use prometheus::{CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry};

use crate::error::AdminError;

/// Prometheus metrics for the configuration engine.
pub struct Metrics {
    /// Registry for all metrics.
    registry: Registry,
    /// Load cycles by outcome.
    pub loads_total: CounterVec,
    /// Load cycle duration in seconds.
    pub load_duration_seconds: Histogram,
    /// Unix time of the last successful load.
    pub last_load_timestamp_seconds: Gauge,
    /// Number of sources applied by the last successful load.
    pub sources: Gauge,
}

impl Metrics {
    /// Creates a new metrics instance with all gauges and counters.
    pub fn new() -> Result<Self, AdminError> {
        let registry = Registry::new();

        let loads_total = CounterVec::new(
            Opts::new("casc_loads_total", "Total number of configuration load cycles"),
            &["status"],
        )
        .map_err(metrics_error)?;
        // Export both outcomes at zero before the first cycle.
        for status in ["success", "failure"] {
            loads_total.with_label_values(&[status]);
        }

        let load_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "casc_load_duration_seconds",
                "Time taken by configuration load cycles in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )
        .map_err(metrics_error)?;

        let last_load_timestamp_seconds = Gauge::new(
            "casc_last_load_timestamp_seconds",
            "Unix time of the last successful configuration load",
        )
        .map_err(metrics_error)?;

        let sources = Gauge::new(
            "casc_sources",
            "Number of sources applied by the last successful load",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(loads_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(load_duration_seconds.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(last_load_timestamp_seconds.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(sources.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            loads_total,
            load_duration_seconds,
            last_load_timestamp_seconds,
            sources,
        })
    }

    /// Records a successful load cycle.
    pub fn record_success(&self, duration_secs: f64, source_count: usize, timestamp: i64) {
        self.loads_total.with_label_values(&["success"]).inc();
        self.load_duration_seconds.observe(duration_secs);
        self.sources.set(source_count as f64);
        self.last_load_timestamp_seconds.set(timestamp as f64);
    }

    /// Records a failed load cycle.
    pub fn record_failure(&self, duration_secs: f64) {
        self.loads_total.with_label_values(&["failure"]).inc();
        self.load_duration_seconds.observe(duration_secs);
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, AdminError> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(metrics_error)
    }
}

fn metrics_error(e: impl std::fmt::Display) -> AdminError {
    AdminError::Metrics(e.to_string())
}
