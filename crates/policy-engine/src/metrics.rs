//! Translation metrics.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct PolicyMetrics {
    /// Activities emitted, by origin record family.
    pub translated_total: IntCounterVec,
    /// Records that matched no policy rule.
    pub unmatched_total: IntCounterVec,
    /// Runtime rule evaluation errors (the record is skipped, not retried).
    pub rule_errors_total: IntCounter,
}

impl PolicyMetrics {
    pub fn new(registry: &Registry) -> Self {
        let translated_total = IntCounterVec::new(
            Opts::new("activity_translated_total", "Activities emitted by the policy engine"),
            &["origin"],
        )
        .expect("Failed to create translated_total metric");

        let unmatched_total = IntCounterVec::new(
            Opts::new(
                "activity_unmatched_records_total",
                "Records that matched no policy rule",
            ),
            &["origin"],
        )
        .expect("Failed to create unmatched_total metric");

        let rule_errors_total = IntCounter::new(
            "activity_rule_errors_total",
            "Runtime rule evaluation errors",
        )
        .expect("Failed to create rule_errors_total metric");

        registry
            .register(Box::new(translated_total.clone()))
            .expect("Failed to register translated_total");
        registry
            .register(Box::new(unmatched_total.clone()))
            .expect("Failed to register unmatched_total");
        registry
            .register(Box::new(rule_errors_total.clone()))
            .expect("Failed to register rule_errors_total");

        Self {
            translated_total,
            unmatched_total,
            rule_errors_total,
        }
    }

    pub fn unregistered() -> Self {
        Self::new(&Registry::new())
    }
}
