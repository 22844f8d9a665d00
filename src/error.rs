// src/error.rs
//
// Submission failure taxonomy. Every error is terminal for the current
// submission (manual re-submit model, no automatic retry) and must stay
// distinguishable all the way to the operator-facing message.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubmissionError>;

#[derive(Error, Debug, Clone)]
pub enum SubmissionError {
    #[error("Expected exactly 4 approach images, got {actual}")]
    InvalidInputCount { actual: usize },

    #[error("Invalid response format from server: {0}")]
    InvalidResponseShape(String),

    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Server error {status}: {body}")]
    UpstreamServerError { status: u16, body: String },

    #[error("No response from server ({0}). Check your connection and the server URL")]
    NetworkUnreachable(String),

    #[error("No response from server within {secs}s")]
    Timeout { secs: u64 },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl SubmissionError {
    /// Stable tag for logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInputCount { .. } => "invalid_input_count",
            Self::InvalidResponseShape(_) => "invalid_response_shape",
            Self::AuthenticationFailed => "authentication_failed",
            Self::UpstreamServerError { .. } => "upstream_server_error",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::Timeout { .. } => "timeout",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn shape<S: Into<String>>(detail: S) -> Self {
        Self::InvalidResponseShape(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_distinct() {
        let errors = [
            SubmissionError::InvalidInputCount { actual: 3 },
            SubmissionError::InvalidResponseShape("missing arrays".to_string()),
            SubmissionError::AuthenticationFailed,
            SubmissionError::UpstreamServerError {
                status: 500,
                body: "boom".to_string(),
            },
            SubmissionError::NetworkUnreachable("connection refused".to_string()),
            SubmissionError::Timeout { secs: 120 },
            SubmissionError::Unknown("?".to_string()),
        ];

        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_messages_identify_the_failure() {
        let err = SubmissionError::InvalidInputCount { actual: 5 };
        assert!(err.to_string().contains("got 5"));

        let err = SubmissionError::UpstreamServerError {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.to_string().contains("503"));
    }
}
