use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use crate::submitter::Submitter;
use crate::types::{PendingSubmission, SubmissionStatus};

/// Records older than this are evicted unconditionally at sweep time.
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Only records that last moved within this window are re-driven.
pub const RECOVERY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// What a sweep did, for logging and operator output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub pruned: usize,
    pub recovered: Vec<String>,
    pub refailed: Vec<String>,
}

/// Startup sweep over the pending store: evicts stale records, then
/// re-drives recent failures through the submitter one at a time.
///
/// Each instance remembers which ids it already picked up, so running the
/// sweep twice in one process does not re-drive the same submission. A
/// fresh process starts with a clean slate and will retry again.
pub struct Recovery<'a> {
    submitter: &'a Submitter,
    already_recovered: HashSet<String>,
}

impl<'a> Recovery<'a> {
    pub fn new(submitter: &'a Submitter) -> Self {
        Self {
            submitter,
            already_recovered: HashSet::new(),
        }
    }

    pub async fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        let store = self.submitter.store();

        report.evicted = store.evict_older_than(RETENTION);
        if report.evicted > 0 {
            tracing::info!("[recovery] Evicted {} stale submission(s)", report.evicted);
        }
        report.pruned = store.prune_settled(self.submitter.config().grace_window);

        let cutoff = Utc::now().timestamp_millis() - RECOVERY_WINDOW.as_millis() as i64;
        let candidates: Vec<PendingSubmission> = store
            .load()
            .into_iter()
            .filter(|r| is_candidate(r, cutoff))
            .filter(|r| !self.already_recovered.contains(&r.id))
            .collect();
        if candidates.is_empty() {
            return report;
        }

        tracing::info!("[recovery] Re-driving {} submission(s)", candidates.len());
        for record in candidates {
            let id = record.id.clone();
            self.already_recovered.insert(id.clone());
            match self.submitter.resubmit(record).await {
                Ok(receipt) => {
                    tracing::info!(
                        "[recovery] Recovered {} after {} attempt(s)",
                        receipt.id,
                        receipt.attempts
                    );
                    report.recovered.push(id);
                }
                Err(err) => {
                    tracing::warn!("[recovery] Submission {} failed again: {}", id, err);
                    report.refailed.push(id);
                }
            }
        }
        report
    }
}

/// A record is worth re-driving when it failed recently, or when a previous
/// process died mid-send and left it in `Sending` recently.
fn is_candidate(record: &PendingSubmission, cutoff_ms: i64) -> bool {
    match record.status {
        SubmissionStatus::Failed => record.failed_at.map_or(false, |t| t >= cutoff_ms),
        SubmissionStatus::Sending => {
            record.last_attempt.unwrap_or(record.created_at) >= cutoff_ms
        }
        SubmissionStatus::LikelySuccess => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Selection, SubmissionRequest};

    fn record_with(status: SubmissionStatus) -> PendingSubmission {
        let request = SubmissionRequest::new(
            "Avery Quinn",
            "Operations",
            vec![Selection {
                course: "Incident response".to_string(),
                reason: "On-call rotation starts next quarter".to_string(),
            }],
            "",
            "abcd-ef01-2345",
            "test-agent",
        )
        .unwrap();
        let mut record = PendingSubmission::new(request);
        record.status = status;
        record
    }

    #[test]
    fn failed_within_window_is_candidate() {
        let now = Utc::now().timestamp_millis();
        let cutoff = now - 60 * 60 * 1000;

        let mut record = record_with(SubmissionStatus::Failed);
        record.failed_at = Some(now - 10 * 60 * 1000);
        assert!(is_candidate(&record, cutoff));

        record.failed_at = Some(now - 2 * 60 * 60 * 1000);
        assert!(!is_candidate(&record, cutoff), "old failure must be skipped");

        record.failed_at = None;
        assert!(!is_candidate(&record, cutoff));
    }

    #[test]
    fn abandoned_sending_falls_back_to_creation_time() {
        let now = Utc::now().timestamp_millis();
        let cutoff = now - 60 * 60 * 1000;

        let mut record = record_with(SubmissionStatus::Sending);
        record.last_attempt = None;
        record.created_at = now - 5 * 60 * 1000;
        assert!(is_candidate(&record, cutoff));

        record.created_at = now - 3 * 60 * 60 * 1000;
        assert!(!is_candidate(&record, cutoff));

        record.last_attempt = Some(now - 1000);
        assert!(is_candidate(&record, cutoff), "recent attempt wins over old creation");
    }

    #[test]
    fn likely_success_is_never_a_candidate() {
        let now = Utc::now().timestamp_millis();
        let mut record = record_with(SubmissionStatus::LikelySuccess);
        record.completed_at = Some(now);
        assert!(!is_candidate(&record, now - 60 * 60 * 1000));
    }
}
