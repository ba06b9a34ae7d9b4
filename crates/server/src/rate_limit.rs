//! Fixed-window rate limiting on ingestion paths, keyed by tenant scope.
//!
//! Single-instance in-memory limiter; replicas each enforce their own
//! budget.

use activity_core::config::RateLimitTiers;
use activity_core::{ActivityError, ActivityResult, Scope, ScopeType};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u64,
    reset_at: Instant,
}

#[derive(Clone)]
pub struct ScopeRateLimiter {
    windows: Arc<DashMap<String, WindowEntry>>,
    tiers: RateLimitTiers,
}

impl ScopeRateLimiter {
    pub fn new(tiers: RateLimitTiers) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            tiers,
        }
    }

    fn budget(&self, scope: &Scope) -> u64 {
        match scope.scope_type {
            ScopeType::Platform => self.tiers.platform,
            ScopeType::Organization => self.tiers.organization,
            ScopeType::Project => self.tiers.project,
            ScopeType::User => self.tiers.user,
        }
    }

    /// Count one request against the scope's window.
    pub fn check(&self, scope: &Scope) -> ActivityResult<()> {
        let key = format!("{}/{}", scope.scope_type.as_str(), scope.name);
        let budget = self.budget(scope);
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry(key)
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + WINDOW,
            });

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + WINDOW;
        }
        if entry.count >= budget {
            let retry_after_seconds = entry.reset_at.saturating_duration_since(now).as_secs().max(1);
            return Err(ActivityError::RateLimited { retry_after_seconds });
        }
        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_per_tier_budgets() {
        let limiter = ScopeRateLimiter::new(RateLimitTiers {
            platform: 100,
            organization: 10,
            project: 2,
            user: 1,
        });
        let project = Scope::new(ScopeType::Project, "backend-api");

        assert!(limiter.check(&project).is_ok());
        assert!(limiter.check(&project).is_ok());
        let err = limiter.check(&project).unwrap_err();
        assert_eq!(err.status_code(), 429);

        // Another tenant in the same tier has its own window.
        let other = Scope::new(ScopeType::Project, "frontend");
        assert!(limiter.check(&other).is_ok());
    }
}
