//! Error types for the translation engine
//!
//! Every backend failure is mapped onto one [`MtError`] variant, and every
//! variant belongs to exactly one [`ErrorClass`]. The fallback chain only
//! ever branches on the class.

use thiserror::Error;

/// Failure taxonomy the fallback chain reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Rate or usage limit hit; move on to the next backend
    Quota,
    /// Server-side hiccup or guard timeout; retry the same backend
    Transient,
    /// The content itself was refused; never retried elsewhere
    ContentPolicy,
    /// The reply could not be parsed or validated
    Malformed,
    /// Transport failure reaching the service
    Network,
    /// Anything else (configuration, invalid input, I/O)
    Other,
}

impl ErrorClass {
    /// Tag written into `TranslationResult::error`
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorClass::Quota => "quotaExceeded",
            ErrorClass::Transient => "transientServerError",
            ErrorClass::ContentPolicy => "contentPolicyRejected",
            ErrorClass::Malformed => "malformedResponse",
            ErrorClass::Network => "networkFailure",
            ErrorClass::Other => "other",
        }
    }

    /// Whether the same backend deserves another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::Transient | ErrorClass::Malformed | ErrorClass::Network
        )
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error types for the translation engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// Rate limit or usage quota exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// 5xx-style failure on the service side
    #[error("Transient server error: {0}")]
    TransientServerError(String),

    /// The call did not finish within the guard timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The service refused the content (safety filter, moderation)
    #[error("Content policy rejected: {0}")]
    ContentPolicyRejected(String),

    /// Reply could not be parsed or failed validation
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A multi-item reply returned the wrong number of entries
    #[error("Batch count mismatch: expected {expected}, got {got}")]
    CountMismatch { expected: usize, got: usize },

    /// Connection, DNS or request-level transport failure
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid locale code
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    /// The item source could not be read
    #[error("Source error: {0}")]
    SourceError(String),

    /// Results could not be written
    #[error("Persist error: {0}")]
    PersistError(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

impl MtError {
    /// Classify this error for the fallback policy
    pub fn class(&self) -> ErrorClass {
        match self {
            MtError::QuotaExceeded(_) => ErrorClass::Quota,
            MtError::TransientServerError(_) | MtError::Timeout(_) => ErrorClass::Transient,
            MtError::ContentPolicyRejected(_) => ErrorClass::ContentPolicy,
            MtError::MalformedResponse(_) | MtError::CountMismatch { .. } => ErrorClass::Malformed,
            MtError::NetworkFailure(_) => ErrorClass::Network,
            MtError::ConfigError(_)
            | MtError::InvalidLocale(_)
            | MtError::SourceError(_)
            | MtError::PersistError(_)
            | MtError::Other(_) => ErrorClass::Other,
        }
    }

    /// `"<tag>: <message>"`, the form stored on untranslated results
    pub fn tagged(&self) -> String {
        format!("{}: {}", self.class().tag(), self)
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MtError::Timeout(err.to_string())
        } else if err.is_decode() {
            MtError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            crate::mt::response::classify_http_failure(status.as_u16(), &err.to_string())
        } else {
            MtError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MtError {
    fn from(err: serde_json::Error) -> Self {
        MtError::MalformedResponse(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(MtError::QuotaExceeded("x".into()).class(), ErrorClass::Quota);
        assert_eq!(MtError::Timeout("x".into()).class(), ErrorClass::Transient);
        assert_eq!(
            MtError::CountMismatch { expected: 2, got: 1 }.class(),
            ErrorClass::Malformed
        );
        assert_eq!(MtError::ConfigError("x".into()).class(), ErrorClass::Other);
    }

    #[test]
    fn test_tagged_message() {
        let err = MtError::ContentPolicyRejected("blocked".to_string());
        assert_eq!(
            err.tagged(),
            "contentPolicyRejected: Content policy rejected: blocked"
        );
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ErrorClass::Transient.is_retryable());
        assert!(ErrorClass::Network.is_retryable());
        assert!(ErrorClass::Malformed.is_retryable());
        assert!(!ErrorClass::Other.is_retryable());
        assert!(!ErrorClass::Quota.is_retryable());
        assert!(!ErrorClass::ContentPolicy.is_retryable());
    }
}
