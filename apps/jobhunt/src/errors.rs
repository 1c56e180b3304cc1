use std::path::PathBuf;

use thiserror::Error;

use crate::llm_client::LlmError;

/// Failure of an external collaborator (LLM, web search, document generation).
///
/// Callers decide the fallback: role suggestion falls back to the default title
/// list, career-page resolution degrades to `Unresolved`, placeholder generation
/// fails the attempt.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Malformed collaborator response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run-level error. Anything that reaches `main` as an `AppError` aborts the run
/// with a non-zero exit code; narrower failures are contained further down.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CV could not be read from {path}: {reason}")]
    CvUnreadable { path: PathBuf, reason: String },

    #[error("Candidate profile could not be loaded from {path}: {reason}")]
    Profile { path: PathBuf, reason: String },

    #[error("Every source failed for every search combination")]
    DiscoveryFailed,

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Cancelled => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_with_usage_code() {
        assert_eq!(AppError::Config("bad".into()).exit_code(), 2);
    }

    #[test]
    fn test_unreadable_cv_is_total_failure() {
        let err = AppError::CvUnreadable {
            path: PathBuf::from("data/cv.pdf"),
            reason: "missing".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("data/cv.pdf"));
    }
}
