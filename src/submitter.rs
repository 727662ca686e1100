use std::sync::Arc;

use chrono::Utc;

use crate::config::SubmitConfig;
use crate::error::{Result, SatchelError};
use crate::store::PendingStore;
use crate::transport::{backoff_delay, AttemptOutcome, Transport};
use crate::types::{
    PendingSubmission, SubmissionPayload, SubmissionReceipt, SubmissionRequest, SubmissionStatus,
};

/// Caller-supplied hook receiving human-readable progress text before each
/// attempt and before each backoff wait.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Drives one logical submission from first attempt to settlement, keeping
/// the store in step with every transition.
///
/// Single-flight discipline is the caller's job (see
/// [`crate::guard::SubmissionGuard`]); the submitter assumes no two logical
/// submissions run at once.
pub struct Submitter {
    store: Arc<PendingStore>,
    transport: Arc<dyn Transport>,
    config: SubmitConfig,
    progress: Option<ProgressFn>,
}

impl Submitter {
    pub fn new(
        store: Arc<PendingStore>,
        transport: Arc<dyn Transport>,
        config: SubmitConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            progress: None,
        }
    }

    /// Attach a progress hook for UI layers.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn store(&self) -> &Arc<PendingStore> {
        &self.store
    }

    pub fn config(&self) -> &SubmitConfig {
        &self.config
    }

    /// Deliver a request, retrying transient failures with backoff until the
    /// submission settles. Resolves once it is likely delivered, or with the
    /// last failure once every attempt is spent.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt> {
        let record = PendingSubmission::new(request);
        tracing::info!("[submit] Started submission {}", record.id);
        self.store.insert(record.clone());
        self.drive(record).await
    }

    /// Re-enter a previously persisted record into the attempt loop,
    /// restarting its attempt counter while keeping its identity and
    /// creation time. Used by the startup recovery sweep.
    pub async fn resubmit(&self, mut record: PendingSubmission) -> Result<SubmissionReceipt> {
        record.status = SubmissionStatus::Sending;
        record.attempts = 0;
        record.payload.attempt = 0;
        record.failed_at = None;
        record.error = None;
        tracing::info!("[submit] Re-driving submission {}", record.id);
        self.store.insert(record.clone());
        self.drive(record).await
    }

    async fn drive(&self, record: PendingSubmission) -> Result<SubmissionReceipt> {
        let id = record.id;
        let payload = record.payload;
        let total = self.config.max_retries + 1;
        let mut last_error = SatchelError::Network {
            attempts: 0,
            detail: "no attempt made".to_string(),
        };

        for n in 0..total {
            let attempt = n + 1;
            let now = Utc::now().timestamp_millis();
            self.store.update(&id, |r| {
                r.attempts = attempt;
                r.payload.attempt = attempt;
                r.last_attempt = Some(now);
            });
            self.report(&format!("Sending attempt {} of {}", attempt, total));

            let mut wire = payload.clone();
            wire.attempt = attempt;

            match self.transport.attempt(&wire).await {
                AttemptOutcome::Delivered => {
                    return self.settle_delivered(&id, attempt).await;
                }
                AttemptOutcome::TimedOut => {
                    tracing::warn!("[submit] Attempt {}/{} for {} timed out", attempt, total, id);
                    last_error = SatchelError::TimedOut { attempts: attempt };
                }
                AttemptOutcome::NetworkError(detail) => {
                    tracing::warn!(
                        "[submit] Attempt {}/{} for {} failed: {}",
                        attempt,
                        total,
                        id,
                        detail
                    );
                    last_error = SatchelError::Network {
                        attempts: attempt,
                        detail,
                    };
                }
            }

            if attempt < total {
                let delay = backoff_delay(n, self.config.base_delay, self.config.backoff_cap);
                self.report(&format!(
                    "Retrying in {:.1}s (attempt {} of {})",
                    delay.as_secs_f64(),
                    attempt + 1,
                    total
                ));
                tokio::time::sleep(delay).await;
            }
        }

        self.settle_failed(&id, &payload, last_error)
    }

    async fn settle_delivered(&self, id: &str, attempts: u32) -> Result<SubmissionReceipt> {
        // The collector never acknowledges, so give it a beat to process
        // before calling the submission settled.
        tokio::time::sleep(self.config.verify_delay).await;

        let now = Utc::now().timestamp_millis();
        self.store.update(id, |r| {
            r.status = SubmissionStatus::LikelySuccess;
            r.completed_at = Some(now);
        });
        tracing::info!(
            "[submit] Submission {} likely delivered after {} attempt(s)",
            id,
            attempts
        );

        // Keep the record through a short grace window, then drop it.
        let store = Arc::clone(&self.store);
        let grace = self.config.grace_window;
        let grace_id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            store.remove(&grace_id);
        });

        Ok(SubmissionReceipt {
            id: id.to_string(),
            attempts,
        })
    }

    fn settle_failed(
        &self,
        id: &str,
        payload: &SubmissionPayload,
        error: SatchelError,
    ) -> Result<SubmissionReceipt> {
        let detail = error.to_string();
        let now = Utc::now().timestamp_millis();
        self.store.update(id, |r| {
            r.status = SubmissionStatus::Failed;
            r.failed_at = Some(now);
            r.error = Some(detail.clone());
        });
        self.store.write_backup(payload);
        tracing::warn!("[submit] Submission {} settled failed: {}", id, detail);
        Err(error)
    }

    fn report(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }
}
