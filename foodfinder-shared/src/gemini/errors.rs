//! # Upstream Failure Types
//!
//! A failed upstream call is described by the HTTP status it produced and the
//! body text, which is all the selection cascade needs to decide what to do next.

use thiserror::Error;

/// Status used when no HTTP response was obtained.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Status used when the upstream answered 2xx without any reply text.
pub const EMPTY_REPLY_STATUS: u16 = 502;

/// How a failed attempt influences the rest of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The model or version does not exist for this key.
    NotFound,
    /// The key ran out of quota.
    QuotaExceeded,
    Other,
}

impl FailureKind {
    #[must_use]
    pub const fn classify(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            429 => Self::QuotaExceeded,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Other => "error",
        }
    }
}

/// One failed call to the Generative Language API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream request failed with status {status}: {body}")]
pub struct AttemptFailure {
    pub status: u16,
    pub body: String,
}

impl AttemptFailure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The request never produced a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_FAILURE_STATUS, message)
    }

    #[must_use]
    pub fn empty_reply() -> Self {
        Self::new(EMPTY_REPLY_STATUS, "No reply returned")
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        FailureKind::classify(self.status)
    }

    /// First `limit` characters of the body, for diagnostics.
    #[must_use]
    pub fn truncated_body(&self, limit: usize) -> String {
        self.body.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(FailureKind::classify(404), FailureKind::NotFound);
        assert_eq!(FailureKind::classify(429), FailureKind::QuotaExceeded);
        assert_eq!(FailureKind::classify(500), FailureKind::Other);
        assert_eq!(FailureKind::classify(0), FailureKind::Other);
        assert_eq!(AttemptFailure::empty_reply().kind(), FailureKind::Other);
    }

    #[test]
    fn test_truncated_body_counts_characters() {
        let failure = AttemptFailure::new(400, "é".repeat(600));
        assert_eq!(failure.truncated_body(500).chars().count(), 500);
        assert_eq!(AttemptFailure::new(400, "short").truncated_body(500), "short");
    }

    #[test]
    fn test_display() {
        let failure = AttemptFailure::transport("connection refused");
        assert_eq!(failure.status, TRANSPORT_FAILURE_STATUS);
        assert_eq!(
            failure.to_string(),
            "upstream request failed with status 0: connection refused"
        );
    }
}
