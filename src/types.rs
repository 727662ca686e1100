use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SatchelError};

/// Most course selections a single submission may carry.
pub const MAX_SELECTION: usize = 3;
/// Longest accepted free-text comment, in characters; longer input is cut.
pub const MAX_COMMENT_CHARS: usize = 500;
/// Longest recorded client signature, in characters; longer input is cut.
pub const MAX_USER_AGENT_CHARS: usize = 200;

/// One chosen course and the reason it was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub course: String,
    pub reason: String,
}

/// A validated assessment answer, immutable once constructed.
///
/// Use [`SubmissionRequest::new`] to build one; it enforces the same bounds
/// the assessment form enforces, truncates the free-text fields, and stamps
/// the request with an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub name: String,
    pub area: String,
    pub selections: Vec<Selection>,
    pub comments: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl SubmissionRequest {
    /// Validate and normalize caller input into a request.
    ///
    /// Comments and the client signature are truncated rather than rejected;
    /// every other out-of-bounds field is an
    /// [`SatchelError::InvalidRequest`].
    pub fn new(
        name: &str,
        area: &str,
        selections: Vec<Selection>,
        comments: &str,
        session_id: &str,
        user_agent: &str,
    ) -> Result<Self> {
        let name = name.trim();
        let name_len = name.chars().count();
        if !(3..=100).contains(&name_len) {
            return Err(SatchelError::InvalidRequest(
                "name must be 3-100 characters".to_string(),
            ));
        }
        let area = area.trim();
        if area.is_empty() {
            return Err(SatchelError::InvalidRequest(
                "area is required".to_string(),
            ));
        }
        if selections.is_empty() {
            return Err(SatchelError::InvalidRequest(
                "at least one course selection is required".to_string(),
            ));
        }
        if selections.len() > MAX_SELECTION {
            return Err(SatchelError::InvalidRequest(format!(
                "at most {} course selections are allowed",
                MAX_SELECTION
            )));
        }
        for selection in &selections {
            if selection.course.trim().is_empty() {
                return Err(SatchelError::InvalidRequest(
                    "selection is missing a course".to_string(),
                ));
            }
            if selection.reason.trim().is_empty() {
                return Err(SatchelError::InvalidRequest(format!(
                    "selection '{}' is missing a reason",
                    selection.course
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            area: area.to_string(),
            selections,
            comments: truncate_chars(comments.trim(), MAX_COMMENT_CHARS),
            session_id: session_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_agent: truncate_chars(user_agent, MAX_USER_AGENT_CHARS),
        })
    }
}

/// The wire shape delivered to the collector: record identity, the current
/// attempt number (so a retried send is self-describing), and the request
/// fields flattened alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "submissionId")]
    pub submission_id: String,
    pub attempt: u32,
    #[serde(flatten)]
    pub request: SubmissionRequest,
}

/// Where a persisted submission stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Sending,
    LikelySuccess,
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            SubmissionStatus::Sending => "sending",
            SubmissionStatus::LikelySuccess => "likely_success",
            SubmissionStatus::Failed => "failed",
        };
        f.write_str(token)
    }
}

/// Persisted record tracking one logical submission across attempts and
/// process restarts. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: String,
    pub payload: SubmissionPayload,
    pub status: SubmissionStatus,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub attempts: u32,
    #[serde(rename = "lastAttempt", skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<i64>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(rename = "failedAt", skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PendingSubmission {
    /// Wrap a request in a fresh record with a newly minted id.
    pub fn new(request: SubmissionRequest) -> Self {
        let id = submission_id();
        Self {
            payload: SubmissionPayload {
                submission_id: id.clone(),
                attempt: 0,
                request,
            },
            id,
            status: SubmissionStatus::Sending,
            created_at: Utc::now().timestamp_millis(),
            attempts: 0,
            last_attempt: None,
            completed_at: None,
            failed_at: None,
            error: None,
        }
    }
}

/// Returned to the caller once a submission is likely delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub id: String,
    pub attempts: u32,
}

/// Mint a submission id: creation time plus a random suffix, unique enough
/// within one store.
pub fn submission_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("sub_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Mint a session identity in the `xxxx-xxxx-xxxx` hex form the assessment
/// page stamps on every payload it sends.
pub fn session_id() -> String {
    let mut rng = rand::thread_rng();
    let groups: Vec<String> = (0..3)
        .map(|_| {
            (0..4)
                .map(|_| format!("{:x}", rng.gen_range(0..16)))
                .collect()
        })
        .collect();
    groups.join("-")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(course: &str) -> Selection {
        Selection {
            course: course.to_string(),
            reason: "Development".to_string(),
        }
    }

    fn valid_request() -> SubmissionRequest {
        SubmissionRequest::new(
            "Ada Lovelace",
            "Quality",
            vec![selection("SPC")],
            "no comments",
            "abcd-1234-ef56",
            "test-agent/1.0",
        )
        .unwrap()
    }

    #[test]
    fn rejects_short_and_long_names() {
        let short = SubmissionRequest::new(
            "Al",
            "Quality",
            vec![selection("SPC")],
            "",
            "s",
            "ua",
        );
        assert!(matches!(short, Err(SatchelError::InvalidRequest(_))));

        let long_name = "x".repeat(101);
        let long = SubmissionRequest::new(
            &long_name,
            "Quality",
            vec![selection("SPC")],
            "",
            "s",
            "ua",
        );
        assert!(matches!(long, Err(SatchelError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_empty_area_and_selection_bounds() {
        assert!(SubmissionRequest::new("Ada", "  ", vec![selection("SPC")], "", "s", "ua").is_err());
        assert!(SubmissionRequest::new("Ada", "Quality", vec![], "", "s", "ua").is_err());

        let four = (0..4).map(|i| selection(&format!("Course {}", i))).collect();
        assert!(SubmissionRequest::new("Ada", "Quality", four, "", "s", "ua").is_err());
    }

    #[test]
    fn rejects_selection_without_reason() {
        let bad = Selection {
            course: "SPC".to_string(),
            reason: "  ".to_string(),
        };
        let result = SubmissionRequest::new("Ada", "Quality", vec![bad], "", "s", "ua");
        assert!(matches!(result, Err(SatchelError::InvalidRequest(_))));
    }

    #[test]
    fn truncates_comments_and_user_agent() {
        let comments = "c".repeat(600);
        let agent = "a".repeat(300);
        let request = SubmissionRequest::new(
            "Ada Lovelace",
            "Quality",
            vec![selection("SPC")],
            &comments,
            "s",
            &agent,
        )
        .unwrap();
        assert_eq!(request.comments.chars().count(), MAX_COMMENT_CHARS);
        assert_eq!(request.user_agent.chars().count(), MAX_USER_AGENT_CHARS);
    }

    #[test]
    fn stamps_utc_timestamp() {
        let request = valid_request();
        assert!(
            request.timestamp.ends_with('Z'),
            "expected a UTC timestamp, got {}",
            request.timestamp
        );
    }

    #[test]
    fn submission_id_format() {
        let id = submission_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "sub");
        assert!(parts[1].parse::<i64>().is_ok(), "millis part: {}", parts[1]);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_id_format() {
        let id = session_id();
        assert_eq!(id.len(), 14, "xxxx-xxxx-xxxx is 14 chars, got {}", id);
        for (i, c) in id.chars().enumerate() {
            if i == 4 || i == 9 {
                assert_eq!(c, '-');
            } else {
                assert!(c.is_ascii_hexdigit(), "unexpected char {} in {}", c, id);
            }
        }
    }

    #[test]
    fn wire_payload_uses_camel_case_and_flattens_request() {
        let record = PendingSubmission::new(valid_request());
        let value = serde_json::to_value(&record.payload).unwrap();

        assert!(value.get("submissionId").is_some());
        assert_eq!(value["attempt"], 0);
        // Request fields sit at the top level, not nested under "request".
        assert!(value.get("request").is_none());
        assert_eq!(value["name"], "Ada Lovelace");
        assert!(value.get("sessionId").is_some());
        assert!(value.get("userAgent").is_some());
        assert_eq!(value["selections"][0]["course"], "SPC");
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&SubmissionStatus::LikelySuccess).unwrap();
        assert_eq!(json, "\"likely_success\"");
        let back: SubmissionStatus = serde_json::from_str("\"sending\"").unwrap();
        assert_eq!(back, SubmissionStatus::Sending);
    }

    #[test]
    fn record_serializes_with_camel_case_timestamps() {
        let record = PendingSubmission::new(valid_request());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("createdAt").is_some());
        // Unset optionals stay off the wire entirely.
        assert!(value.get("lastAttempt").is_none());
        assert!(value.get("failedAt").is_none());
        assert_eq!(value["status"], "sending");
        assert_eq!(value["payload"]["submissionId"], record.id);
    }
}
