//! Failure classification for generation calls.
//!
//! The service reports failures as an HTTP status plus a free-text
//! description. [`from_status`] maps the statuses the API documents (429,
//! 404, 408/504) directly; everything else goes through [`classify_failure`],
//! which inspects the description for `"quota"` and `"not found"`. Callers
//! never match on error strings themselves.

use reqwest::StatusCode;
use thiserror::Error;

/// A generation call that produced no answer.
///
/// Each variant carries the service's own description for logging. The
/// `Display` text is meant for logs, not for end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The API key ran out of quota or the service is rate limiting us.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// The configured model does not exist or is not served to this key.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// No response arrived within the configured request timeout.
    #[error("generation timed out: {0}")]
    Timeout(String),
    /// Any other transport, protocol, or service failure.
    #[error("generation failed: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::QuotaExceeded(_) => "quota_exceeded",
            GenerationError::ModelUnavailable(_) => "model_unavailable",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::Internal(_) => "internal",
        }
    }
}

/// Classify a failure by its free-text description.
///
/// Case-insensitive substring match: `"quota"` means the quota is exhausted,
/// `"not found"` means the model is unavailable, anything else is internal.
pub fn classify_failure(description: impl Into<String>) -> GenerationError {
    let description = description.into();
    let lower = description.to_lowercase();
    if lower.contains("quota") {
        GenerationError::QuotaExceeded(description)
    } else if lower.contains("not found") {
        GenerationError::ModelUnavailable(description)
    } else {
        GenerationError::Internal(description)
    }
}

/// Classify a non-success HTTP response from the API.
///
/// `message` is the error description extracted from the response body (or
/// the raw body when it isn't the usual `{"error": {...}}` envelope).
pub fn from_status(status: StatusCode, message: &str) -> GenerationError {
    let description = format!("Gemini API HTTP {status}: {message}");
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::QuotaExceeded(description),
        StatusCode::NOT_FOUND => GenerationError::ModelUnavailable(description),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GenerationError::Timeout(description)
        }
        _ => classify_failure(description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_substring_is_case_insensitive() {
        let err = classify_failure("429 Resource has been exhausted (e.g. check QUOTA).");
        assert!(matches!(err, GenerationError::QuotaExceeded(_)));
    }

    #[test]
    fn not_found_maps_to_model_unavailable() {
        let err = classify_failure("models/gemini-0.1 is not found for API version v1beta");
        assert!(matches!(err, GenerationError::ModelUnavailable(_)));
    }

    #[test]
    fn quota_wins_over_not_found() {
        let err = classify_failure("quota project not found");
        assert!(matches!(err, GenerationError::QuotaExceeded(_)));
    }

    #[test]
    fn anything_else_is_internal() {
        let err = classify_failure("connection reset by peer");
        assert_eq!(
            err,
            GenerationError::Internal("connection reset by peer".into())
        );
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn structured_statuses_take_priority() {
        assert!(matches!(
            from_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationError::QuotaExceeded(_)
        ));
        assert!(matches!(
            from_status(StatusCode::NOT_FOUND, "no such thing"),
            GenerationError::ModelUnavailable(_)
        ));
        assert!(matches!(
            from_status(StatusCode::GATEWAY_TIMEOUT, "upstream"),
            GenerationError::Timeout(_)
        ));
    }

    #[test]
    fn other_statuses_fall_back_to_description() {
        let err = from_status(StatusCode::FORBIDDEN, "Quota exceeded for project");
        assert!(matches!(err, GenerationError::QuotaExceeded(_)));

        let err = from_status(StatusCode::INTERNAL_SERVER_ERROR, "backend error");
        assert!(matches!(err, GenerationError::Internal(ref d) if d.contains("HTTP 500")));
    }
}
