//! Shared application state.

use crate::rate_limit::ScopeRateLimiter;
use activity_core::Config;
use activity_filter::FilterCache;
use activity_storage::PostgresStore;
use message_log::InMemoryLog;
use policy_engine::{PolicyMetrics, PolicySet, PolicyStore, Translator};
use prometheus::Registry;
use query_engine::{EngineSettings, QueryEngine, QueryMetrics};
use std::sync::Arc;
use watch_engine::{WatchEngine, WatchMetrics};

/// Everything the handlers need, injected once at startup. Metrics
/// registries and the compiled-expression cache are process-wide but reach
/// the handlers through this struct rather than as ambient globals.
pub struct AppState {
    pub config: Config,
    pub store: Arc<PostgresStore>,
    pub log: Arc<InMemoryLog>,
    pub filter_cache: Arc<FilterCache>,
    pub engine: QueryEngine,
    pub watch: WatchEngine<InMemoryLog>,
    pub translator: Arc<Translator>,
    pub policy_store: Arc<PolicyStore>,
    pub policy_set: Arc<PolicySet>,
    pub rate_limiter: ScopeRateLimiter,
    pub registry: Registry,
}

impl AppState {
    pub fn new(config: Config, store: Arc<PostgresStore>, log: Arc<InMemoryLog>) -> Self {
        let registry = Registry::new();
        let filter_cache = Arc::new(FilterCache::default());
        let engine = QueryEngine::new(
            EngineSettings::from(&config),
            Arc::clone(&filter_cache),
            Arc::new(QueryMetrics::new(&registry)),
        );
        let watch = WatchEngine::new(
            Arc::clone(&log),
            Arc::clone(&filter_cache),
            Arc::new(WatchMetrics::new(&registry)),
        );
        let translator = Arc::new(Translator::new(Arc::new(PolicyMetrics::new(&registry))));
        let policy_store = Arc::new(PolicyStore::new(store.pool().clone()));
        let rate_limiter = ScopeRateLimiter::new(config.rate_limits);

        Self {
            config,
            store,
            log,
            filter_cache,
            engine,
            watch,
            translator,
            policy_store,
            policy_set: Arc::new(PolicySet::new()),
            rate_limiter,
            registry,
        }
    }

    /// Rebuild the evaluator snapshot from the policy store; called after
    /// every policy admission.
    pub async fn refresh_policies(&self) {
        match self.policy_store.load_compiled(&self.filter_cache).await {
            Ok(compiled) => self.policy_set.replace(compiled),
            Err(e) => log::error!("policy snapshot refresh failed: {}", e),
        }
    }
}
