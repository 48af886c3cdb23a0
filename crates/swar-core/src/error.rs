//! Error types shared across the swar crates.
//!
//! `ClassifierError` represents failures when talking to an external answer
//! classifier. It is defined here so the classifier adapter can log and
//! classify failures before falling back to local validation.

use thiserror::Error;

/// Errors that can occur when interacting with an external classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The classifier answered, but not with the expected JSON shape.
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
}

impl ClassifierError {
    /// Returns `true` if this error will not go away by asking again.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClassifierError::AuthenticationFailed(_) | ClassifierError::ModelNotFound(_)
        )
    }
}

/// Errors raised by the session pipeline when it is driven incorrectly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A response was submitted after the session completed or was abandoned.
    #[error("session is already complete")]
    AlreadyComplete,

    /// The question bank has no questions to ask.
    #[error("question bank '{0}' has no questions")]
    EmptyBank(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors() {
        assert!(ClassifierError::AuthenticationFailed("bad key".into()).is_permanent());
        assert!(ClassifierError::ModelNotFound("x".into()).is_permanent());
        assert!(!ClassifierError::Timeout(500).is_permanent());
        assert!(!ClassifierError::RateLimited {
            retry_after_ms: 1000
        }
        .is_permanent());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ClassifierError::RateLimited {
                retry_after_ms: 5000
            }
            .to_string(),
            "rate limited, retry after 5000ms"
        );
        assert_eq!(
            SessionError::EmptyBank("g1".into()).to_string(),
            "question bank 'g1' has no questions"
        );
    }
}
