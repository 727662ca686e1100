use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::SubmitConfig;
use crate::error::Result;
use crate::types::SubmissionPayload;

/// Upper bound on backoff jitter in milliseconds.
const JITTER_MS: u64 = 500;

/// How one delivery attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The HTTP exchange completed. The collector's response is opaque, so
    /// this is heuristic success, not an acknowledgment.
    Delivered,
    /// The attempt ran past its deadline.
    TimedOut,
    /// Any other transport-level failure (DNS, refused connection, TLS).
    NetworkError(String),
}

/// One network delivery attempt. Implemented by the real collector client
/// and by scripted doubles in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn attempt(&self, payload: &SubmissionPayload) -> AttemptOutcome;
}

/// POSTs JSON payloads to the collector endpoint.
pub struct CollectorClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl CollectorClient {
    pub fn new(endpoint: String, attempt_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint,
            http_client,
        }
    }

    /// Build a client from config, failing fast when no endpoint is set.
    pub fn from_config(config: &SubmitConfig) -> Result<Self> {
        let endpoint = config.resolve_endpoint()?.to_string();
        Ok(Self::new(endpoint, config.attempt_timeout))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for CollectorClient {
    async fn attempt(&self, payload: &SubmissionPayload) -> AttemptOutcome {
        let result = self
            .http_client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await;

        match result {
            // The collector is a write-only sink: status and body carry no
            // readable signal, so any completed exchange is a delivery.
            Ok(_) => AttemptOutcome::Delivered,
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut,
            Err(e) => AttemptOutcome::NetworkError(e.to_string()),
        }
    }
}

/// Backoff before retry `n` (zero-based): exponential with jitter, capped.
///
/// `delay(n) = min(base * 2^n + jitter, cap)` with jitter drawn uniformly
/// from `[0, 500)` ms, so concurrent clients do not retry in lockstep.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponential = (base.as_millis() as u64).saturating_mul(1u64 << attempt.min(31));
    let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
    Duration::from_millis(exponential.saturating_add(jitter)).min(cap)
}
