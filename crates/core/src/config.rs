//! Typed runtime configuration, loaded from environment variables.

use chrono::Duration;
use std::env;

/// Requests per minute allowed on ingestion paths, per scope tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitTiers {
    pub platform: u64,
    pub organization: u64,
    pub project: u64,
    pub user: u64,
}

impl Default for RateLimitTiers {
    fn default() -> Self {
        Self {
            platform: 6000,
            organization: 1200,
            project: 600,
            user: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub http_addr: String,
    /// Message log endpoint.
    pub message_log_url: String,
    /// Columnar store DSN.
    pub store_dsn: String,
    /// Widest allowed `endTime - startTime` for query resources.
    pub max_query_window: Duration,
    /// Largest accepted page size.
    pub max_page_size: i64,
    /// How long an issued cursor stays valid.
    pub cursor_ttl: Duration,
    /// Window applied to list requests that omit explicit times.
    pub default_list_window: Duration,
    /// Per-request execution deadline.
    pub request_deadline: std::time::Duration,
    pub rate_limits: RateLimitTiers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            message_log_url: "nats://127.0.0.1:4222".to_string(),
            store_dsn: String::new(),
            max_query_window: Duration::days(7),
            max_page_size: 1000,
            cursor_ttl: Duration::hours(1),
            default_list_window: Duration::hours(1),
            request_deadline: std::time::Duration::from_secs(30),
            rate_limits: RateLimitTiers::default(),
        }
    }
}

impl Config {
    /// Build the configuration from the environment, falling back to
    /// defaults for anything unset. `DATABASE_URL` has no default; callers
    /// that need the store fail at connect time when it is missing.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let limits = RateLimitTiers::default();
        Config {
            http_addr: env_or("ACTIVITY_HTTP_ADDR", &defaults.http_addr),
            message_log_url: env_or("ACTIVITY_LOG_URL", &defaults.message_log_url),
            store_dsn: env::var("DATABASE_URL").unwrap_or_default(),
            max_query_window: Duration::days(env_parse("ACTIVITY_MAX_QUERY_WINDOW_DAYS", 7)),
            max_page_size: env_parse("ACTIVITY_MAX_PAGE_SIZE", defaults.max_page_size),
            cursor_ttl: Duration::seconds(env_parse("ACTIVITY_CURSOR_TTL_SECS", 3600)),
            default_list_window: Duration::seconds(env_parse(
                "ACTIVITY_DEFAULT_LIST_WINDOW_SECS",
                3600,
            )),
            request_deadline: std::time::Duration::from_secs(env_parse(
                "ACTIVITY_REQUEST_DEADLINE_SECS",
                30,
            )),
            rate_limits: RateLimitTiers {
                platform: env_parse("ACTIVITY_RATE_LIMIT_PLATFORM", limits.platform),
                organization: env_parse("ACTIVITY_RATE_LIMIT_ORGANIZATION", limits.organization),
                project: env_parse("ACTIVITY_RATE_LIMIT_PROJECT", limits.project),
                user: env_parse("ACTIVITY_RATE_LIMIT_USER", limits.user),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("ignoring unparseable {}={:?}, using the default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.max_query_window, Duration::days(7));
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.cursor_ttl, Duration::hours(1));
        assert_eq!(config.request_deadline.as_secs(), 30);
    }
}
