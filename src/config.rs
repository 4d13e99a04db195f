use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use chrono::Duration;

/// Placeholder secrets shipped for local development. Startup warns when
/// either is still in effect.
pub const DEFAULT_API_KEY: &str = "change-me-in-production";
pub const DEFAULT_JWT_SECRET: &str = "change-me-too";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen_addr: SocketAddr,

    /// Shared key expected in the `X-API-Key` header on operator routes.
    pub api_key: String,

    /// When false (development default) the API-key check is skipped.
    pub require_api_key: bool,

    /// HS256 secret for the bearer tokens issued at connect time.
    pub jwt_secret: String,

    /// Lifetime of an issued bearer token.
    pub token_ttl: Duration,

    /// CORS allow-list. Empty means any origin.
    pub allowed_origins: Vec<String>,

    /// Age after which a command is evicted, executed or not.
    pub command_ttl: Duration,

    /// A server whose last heartbeat is older than this is no longer
    /// reported as active.
    pub active_window: Duration,

    /// A server whose last heartbeat is older than this is removed by the
    /// inactivity sweep. Independent of `active_window`; a server can be
    /// inactive for display yet not eligible for eviction.
    pub inactivity_window: Duration,

    /// Log entries older than this are removed by the scheduled prune.
    pub log_retention: Duration,

    /// Hard cap on retained log entries.
    pub log_capacity: usize,

    /// How often the command-eviction + log-prune pass runs.
    pub cleanup_interval: StdDuration,

    /// How often the inactive-server sweep runs.
    pub sweep_interval: StdDuration,

    /// Fixed-window rate limit applied to `/api` and `/auth` routes.
    pub rate_limit_window: StdDuration,
    pub rate_limit_max: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            api_key: DEFAULT_API_KEY.to_string(),
            require_api_key: false,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl: Duration::hours(24),
            allowed_origins: Vec::new(),
            command_ttl: Duration::hours(1),
            active_window: Duration::minutes(5),
            inactivity_window: Duration::minutes(30),
            log_retention: Duration::days(7),
            log_capacity: 10_000,
            cleanup_interval: StdDuration::from_secs(60 * 60),
            sweep_interval: StdDuration::from_secs(5 * 60),
            rate_limit_window: StdDuration::from_secs(15 * 60),
            rate_limit_max: 100,
        }
    }
}

impl Config {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>, required: bool) -> Self {
        self.api_key = key.into();
        self.require_api_key = required;
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    pub fn with_command_ttl(mut self, ttl: Duration) -> Self {
        self.command_ttl = ttl;
        self
    }

    pub fn with_liveness_windows(mut self, active: Duration, inactivity: Duration) -> Self {
        self.active_window = active;
        self.inactivity_window = inactivity;
        self
    }

    pub fn with_log_retention(mut self, retention: Duration) -> Self {
        self.log_retention = retention;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// True while either secret is still the shipped placeholder.
    pub fn has_placeholder_secrets(&self) -> bool {
        self.api_key == DEFAULT_API_KEY || self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Parse a comma-separated origin list ("https://a.example,https://b.example").
/// Empty input yields an empty list, which means any origin is allowed.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:3000");
        assert!(!cfg.require_api_key);
        assert_eq!(cfg.command_ttl, Duration::hours(1));
        assert_eq!(cfg.active_window, Duration::minutes(5));
        assert_eq!(cfg.inactivity_window, Duration::minutes(30));
        assert_eq!(cfg.log_retention, Duration::days(7));
        assert_eq!(cfg.log_capacity, 10_000);
        assert_eq!(cfg.rate_limit_max, 100);
        assert!(cfg.has_placeholder_secrets());
    }

    #[test]
    fn liveness_windows_stay_independent() {
        let cfg = Config::default()
            .with_liveness_windows(Duration::minutes(2), Duration::minutes(45));
        assert_eq!(cfg.active_window, Duration::minutes(2));
        assert_eq!(cfg.inactivity_window, Duration::minutes(45));
    }

    #[test]
    fn custom_secrets_are_not_flagged() {
        let cfg = Config::default()
            .with_api_key("k-123", true)
            .with_jwt_secret("s-456");
        assert!(!cfg.has_placeholder_secrets());
        assert!(cfg.require_api_key);
    }

    #[test]
    fn parse_origins_splits_and_trims() {
        let origins = parse_origins("https://a.example, https://b.example ,");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
        assert!(parse_origins("").is_empty());
        assert!(parse_origins("  ").is_empty());
    }
}
