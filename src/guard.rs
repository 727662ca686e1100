use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Result, SatchelError};

/// Milliseconds a successful submission blocks the next one.
const COOLDOWN_MS: i64 = 5_000;

/// Most submissions allowed inside one rolling window.
const MAX_SUBMISSIONS: usize = 3;

/// Rolling rate-limit window in milliseconds (5 minutes).
const WINDOW_MS: i64 = 300_000;

/// Single-flight protection for the submit path: one submission at a time,
/// plus a short cooldown after a success so a double-trigger cannot deliver
/// the same answers twice.
///
/// Session-scoped value owned by the caller; the orchestrator assumes the
/// caller consults it before every `submit`.
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    in_flight: bool,
    last_success: Option<i64>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the submit path. Fails while a submission is running or within
    /// the post-success cooldown.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_flight {
            return Err(SatchelError::AlreadyInFlight(
                "a submission is already running".to_string(),
            ));
        }
        if let Some(t) = self.last_success {
            let elapsed = Utc::now().timestamp_millis() - t;
            if elapsed < COOLDOWN_MS {
                return Err(SatchelError::AlreadyInFlight(format!(
                    "last submission finished {}ms ago, cooling down",
                    elapsed
                )));
            }
        }
        self.in_flight = true;
        Ok(())
    }

    /// Release the submit path; a success starts the cooldown.
    pub fn finish(&mut self, success: bool) {
        self.in_flight = false;
        if success {
            self.last_success = Some(Utc::now().timestamp_millis());
        }
    }
}

/// Rolling submission cap persisted in `rate_limit.json`, so restarting the
/// process does not reset the count.
pub struct RateLimiter {
    timestamps: Vec<i64>,
    file_path: PathBuf,
}

impl RateLimiter {
    pub fn open(data_dir: &Path) -> Self {
        let file_path = data_dir.join("rate_limit.json");
        let now = Utc::now().timestamp_millis();
        let timestamps = if file_path.exists() {
            match std::fs::read_to_string(&file_path) {
                Ok(contents) => match serde_json::from_str::<Vec<i64>>(&contents) {
                    Ok(stored) => stored.into_iter().filter(|t| now - t < WINDOW_MS).collect(),
                    Err(e) => {
                        tracing::warn!(
                            "[guard] Failed to parse rate_limit.json, starting empty: {}",
                            e
                        );
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "[guard] Failed to read rate_limit.json, starting empty: {}",
                        e
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Self {
            timestamps,
            file_path,
        }
    }

    /// Refuse when the rolling window is already full.
    pub fn check(&mut self) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.timestamps.retain(|t| now - t < WINDOW_MS);
        if self.timestamps.len() >= MAX_SUBMISSIONS {
            return Err(SatchelError::RateLimited(format!(
                "{} submissions in the last {} minutes, try again later",
                self.timestamps.len(),
                WINDOW_MS / 60_000
            )));
        }
        Ok(())
    }

    /// Count a submission against the window.
    pub fn record(&mut self) {
        self.timestamps.push(Utc::now().timestamp_millis());
        self.save();
    }

    fn save(&self) {
        if let Ok(json) = serde_json::to_string(&self.timestamps) {
            if let Some(parent) = self.file_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(&self.file_path, json) {
                tracing::warn!("[guard] Failed to save rate_limit.json: {}", e);
            }
        }
    }
}
