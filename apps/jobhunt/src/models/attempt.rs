use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    Pending,
    Submitted,
    Failed,
    SkippedManualReview,
}

impl AttemptStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }
}

/// One application attempt per posting per run.
///
/// Status moves out of `Pending` exactly once; `finish` on a finished attempt is
/// refused, so `Submitted` and `Failed` are never left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationAttempt {
    pub id: Uuid,
    pub posting_url: String,
    pub resolved_application_url: Option<String>,
    status: AttemptStatus,
    failure_reason: Option<String>,
    /// Placeholder documents generated and uploaded for this attempt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_documents: Vec<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl ApplicationAttempt {
    pub fn new(posting_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            posting_url: posting_url.into(),
            resolved_application_url: None,
            status: AttemptStatus::Pending,
            failure_reason: None,
            generated_documents: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Moves a pending attempt to its final status. Returns false (and leaves the
    /// attempt untouched) when the attempt already finished or `status` is `Pending`.
    pub fn finish(&mut self, status: AttemptStatus, reason: Option<String>) -> bool {
        if self.status.is_final() || !status.is_final() {
            warn!(
                attempt = %self.id,
                from = ?self.status,
                to = ?status,
                "Refusing attempt status transition"
            );
            return false;
        }
        self.status = status;
        self.failure_reason = reason;
        self.timestamp = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attempt_is_pending() {
        let attempt = ApplicationAttempt::new("https://example.com/job/1");
        assert_eq!(attempt.status(), AttemptStatus::Pending);
        assert!(attempt.failure_reason().is_none());
    }

    #[test]
    fn test_submitted_is_terminal() {
        let mut attempt = ApplicationAttempt::new("https://example.com/job/1");
        assert!(attempt.finish(AttemptStatus::Submitted, None));
        assert!(!attempt.finish(AttemptStatus::Failed, Some("late".into())));
        assert_eq!(attempt.status(), AttemptStatus::Submitted);
        assert!(attempt.failure_reason().is_none());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut attempt = ApplicationAttempt::new("https://example.com/job/1");
        assert!(attempt.finish(AttemptStatus::Failed, Some("unconfirmed".into())));
        assert!(!attempt.finish(AttemptStatus::Submitted, None));
        assert_eq!(attempt.status(), AttemptStatus::Failed);
        assert_eq!(attempt.failure_reason(), Some("unconfirmed"));
    }

    #[test]
    fn test_cannot_finish_as_pending() {
        let mut attempt = ApplicationAttempt::new("https://example.com/job/1");
        assert!(!attempt.finish(AttemptStatus::Pending, None));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&AttemptStatus::SkippedManualReview).unwrap();
        assert_eq!(json, "\"skipped-manual-review\"");
    }
}
