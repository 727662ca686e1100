use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use satchel::{
    AttemptOutcome, Selection, SubmissionPayload, SubmissionRequest, SubmitConfig, Transport,
};

/// Replays a fixed sequence of outcomes and records every payload it saw.
/// Once the script runs out it answers `Delivered`.
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<AttemptOutcome>>,
    seen: Mutex<Vec<SubmissionPayload>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<AttemptOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<SubmissionPayload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt(&self, payload: &SubmissionPayload) -> AttemptOutcome {
        self.seen.lock().unwrap().push(payload.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AttemptOutcome::Delivered)
    }
}

pub fn test_config(dir: &Path) -> SubmitConfig {
    SubmitConfig {
        data_dir: dir.to_path_buf(),
        ..SubmitConfig::default()
    }
}

pub fn sample_request() -> SubmissionRequest {
    SubmissionRequest::new(
        "Avery Quinn",
        "Operations",
        vec![Selection {
            course: "Incident response".to_string(),
            reason: "On-call rotation starts next quarter".to_string(),
        }],
        "",
        "abcd-ef01-2345",
        "integration-test/1.0",
    )
    .unwrap()
}
