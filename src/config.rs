use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SatchelError};

/// Tuning for the submission pipeline, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Collector endpoint URL. Submissions fail fast when unset.
    pub endpoint: Option<String>,
    /// Directory holding pending.json, rate_limit.json and backups.
    pub data_dir: PathBuf,
    /// Retries after the first attempt (4 tries total by default).
    pub max_retries: u32,
    /// First backoff step; doubles on every retry.
    pub base_delay: Duration,
    /// Ceiling on any single backoff wait.
    pub backoff_cap: Duration,
    /// Hard deadline for one delivery attempt.
    pub attempt_timeout: Duration,
    /// Pause after a delivered attempt before declaring likely success.
    pub verify_delay: Duration,
    /// How long a likely_success record lingers before removal.
    pub grace_window: Duration,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            data_dir: PathBuf::from("./data"),
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            backoff_cap: Duration::from_millis(10_000),
            attempt_timeout: Duration::from_millis(15_000),
            verify_delay: Duration::from_millis(500),
            grace_window: Duration::from_secs(5),
        }
    }
}

impl SubmitConfig {
    /// Load config from environment variables with the stock defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("SATCHEL_ENDPOINT").ok().filter(|v| !v.is_empty()),
            data_dir: PathBuf::from(
                std::env::var("SATCHEL_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            ),
            max_retries: std::env::var("SATCHEL_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay: env_millis("SATCHEL_BASE_DELAY_MS").unwrap_or(defaults.base_delay),
            backoff_cap: env_millis("SATCHEL_BACKOFF_CAP_MS").unwrap_or(defaults.backoff_cap),
            attempt_timeout: env_millis("SATCHEL_ATTEMPT_TIMEOUT_MS")
                .unwrap_or(defaults.attempt_timeout),
            verify_delay: defaults.verify_delay,
            grace_window: defaults.grace_window,
        }
    }

    /// The collector URL, or a configuration error when none was supplied.
    pub fn resolve_endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                SatchelError::Config(
                    "no collector endpoint configured (set SATCHEL_ENDPOINT)".to_string(),
                )
            })
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}
