//! Watch stream metrics.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

pub struct WatchMetrics {
    pub active_streams: IntGauge,
    pub delivered_total: IntCounterVec,
}

impl WatchMetrics {
    pub fn new(registry: &Registry) -> Self {
        let active_streams = IntGauge::new(
            "activity_watch_streams",
            "Currently open watch streams",
        )
        .expect("Failed to create active_streams metric");

        let delivered_total = IntCounterVec::new(
            Opts::new("activity_watch_delivered_total", "Objects delivered on watch streams"),
            &["resource"],
        )
        .expect("Failed to create delivered_total metric");

        registry
            .register(Box::new(active_streams.clone()))
            .expect("Failed to register active_streams");
        registry
            .register(Box::new(delivered_total.clone()))
            .expect("Failed to register delivered_total");

        Self {
            active_streams,
            delivered_total,
        }
    }

    pub fn unregistered() -> Self {
        Self::new(&Registry::new())
    }
}
