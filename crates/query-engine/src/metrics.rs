//! Per-query Prometheus metrics.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
};

pub struct QueryMetrics {
    /// Query latency by resource.
    pub duration_seconds: HistogramVec,
    /// Returned result counts by resource.
    pub result_count: HistogramVec,
    /// Executed queries by resource and caller scope type.
    pub queries_total: IntCounterVec,
    /// How far back from now query windows start, in hours.
    pub lookback_hours: Histogram,
    /// Width of query windows, in hours.
    pub range_hours: Histogram,
}

impl QueryMetrics {
    pub fn new(registry: &Registry) -> Self {
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "activity_query_duration_seconds",
                "Query execution latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["resource"],
        )
        .expect("Failed to create duration_seconds metric");

        let result_count = HistogramVec::new(
            HistogramOpts::new(
                "activity_query_results",
                "Number of records returned per query",
            )
            .buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
            &["resource"],
        )
        .expect("Failed to create result_count metric");

        let queries_total = IntCounterVec::new(
            Opts::new("activity_queries_total", "Total executed queries"),
            &["resource", "scope_type"],
        )
        .expect("Failed to create queries_total metric");

        let lookback_hours = Histogram::with_opts(
            HistogramOpts::new(
                "activity_query_lookback_hours",
                "Distance from now to the query window start, in hours",
            )
            .buckets(vec![1.0, 6.0, 24.0, 72.0, 168.0, 720.0]),
        )
        .expect("Failed to create lookback_hours metric");

        let range_hours = Histogram::with_opts(
            HistogramOpts::new(
                "activity_query_range_hours",
                "Width of the query window, in hours",
            )
            .buckets(vec![1.0, 6.0, 24.0, 72.0, 168.0]),
        )
        .expect("Failed to create range_hours metric");

        registry
            .register(Box::new(duration_seconds.clone()))
            .expect("Failed to register duration_seconds");
        registry
            .register(Box::new(result_count.clone()))
            .expect("Failed to register result_count");
        registry
            .register(Box::new(queries_total.clone()))
            .expect("Failed to register queries_total");
        registry
            .register(Box::new(lookback_hours.clone()))
            .expect("Failed to register lookback_hours");
        registry
            .register(Box::new(range_hours.clone()))
            .expect("Failed to register range_hours");

        Self {
            duration_seconds,
            result_count,
            queries_total,
            lookback_hours,
            range_hours,
        }
    }

    /// Unregistered metrics for tests.
    pub fn unregistered() -> Self {
        Self::new(&Registry::new())
    }
}
