use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
///
/// Session credentials are opaque to this system: they are forwarded to the
/// transport layer verbatim and never inspected, refreshed, or persisted.
#[derive(Debug, Clone)]
pub struct Config {
    // Session (opaque, required)
    pub bearer_token: String,
    pub cookie: String,
    pub csrf_token: String,

    // Pagination tuning
    pub page_size: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub inter_page_delay_ms: u64,
    pub empty_page_limit: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            bearer_token: required_env("ROOKERY_BEARER_TOKEN"),
            cookie: required_env("ROOKERY_COOKIE"),
            csrf_token: required_env("ROOKERY_CSRF_TOKEN"),
            page_size: parsed_env("ROOKERY_PAGE_SIZE", 20),
            max_retries: parsed_env("ROOKERY_MAX_RETRIES", 2),
            base_delay_ms: parsed_env("ROOKERY_BASE_DELAY_MS", 2000),
            inter_page_delay_ms: parsed_env("ROOKERY_INTER_PAGE_DELAY_MS", 1000),
            empty_page_limit: parsed_env("ROOKERY_EMPTY_PAGE_LIMIT", 2),
        }
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            page_size = self.page_size,
            max_retries = self.max_retries,
            base_delay_ms = self.base_delay_ms,
            inter_page_delay_ms = self.inter_page_delay_ms,
            empty_page_limit = self.empty_page_limit,
            bearer_token = "<redacted>",
            cookie = "<redacted>",
            csrf_token = "<redacted>",
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a number: {e:?}")),
        Err(_) => default,
    }
}
