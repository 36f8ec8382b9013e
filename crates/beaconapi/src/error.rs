//! Error types for Beacon API calls.
//!
//! Errors are categorized to enable retry logic and appropriate user
//! feedback. HTTP failures keep their status code so callers can tell a
//! missing object from a rejected request.

use thiserror::Error;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport-level failure (connection, DNS, TLS)
    Network,
    /// Request took longer than its timeout
    Timeout,
    /// Object does not exist (404)
    NotFound,
    /// Object state conflict (409)
    Conflict,
    /// Missing or rejected credentials (401, 403)
    Unauthorized,
    /// Request rejected as invalid (400, 422)
    Validation,
    /// Too many requests (429)
    RateLimited,
    /// Server-side failure (5xx)
    Server,
    /// Response body did not match the expected shape
    Decode,
    /// Stopped by cancellation or deadline
    Cancelled,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Map an HTTP status code to a category.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            409 => Self::Conflict,
            401 | 403 => Self::Unauthorized,
            400 | 422 => Self::Validation,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Timeout => "Request timed out",
            Self::NotFound => "Object not found",
            Self::Conflict => "Conflicting object state",
            Self::Unauthorized => "Not authorized",
            Self::Validation => "Request rejected",
            Self::RateLimited => "Rate limited",
            Self::Server => "Server error",
            Self::Decode => "Unexpected response",
            Self::Cancelled => "Cancelled",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the endpoint URL and your connection, then try again",
            Self::Timeout => "Increase the provider timeout or retry later",
            Self::NotFound => "Refresh state; the object may have been deleted outside beacon",
            Self::Conflict => "Another object already uses this name or the object is locked",
            Self::Unauthorized => "Check that the API token is set and has write access",
            Self::Validation => "Fix the attribute values reported by the server",
            Self::RateLimited => "Lower --jobs or wait before retrying",
            Self::Server => "The service is having trouble; retry later",
            Self::Decode => "The server response did not match this client; upgrade beacon",
            Self::Cancelled => "No action needed",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during API calls.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level error
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// The request timed out
    #[error("request timed out: {message}")]
    Timeout {
        /// Details from the HTTP client
        message: String,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Error message from the response body, or the raw body
        message: String,
    },

    /// A success response whose body did not decode
    #[error("cannot decode response: {message}")]
    Decode {
        /// Object id found in the raw body, if any
        id: Option<i64>,
        /// Decoder error
        message: String,
    },

    /// Stopped by the caller's cancel flag
    #[error("request cancelled")]
    Cancelled,

    /// The caller's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an error from a non-success response.
    ///
    /// The server reports `{"message": "..."}`; any other body is kept raw.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| body.trim().to_string());
        Self::Http { status, message }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Http { status, .. } => ErrorCategory::from_status(*status),
            Self::Decode { .. } => ErrorCategory::Decode,
            Self::Cancelled | Self::DeadlineExceeded => ErrorCategory::Cancelled,
            Self::Config(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::Http {
                status,
                message: format!("HTTP {status}"),
            },
            timeout @ ureq::Error::Timeout(_) => Self::Timeout {
                message: timeout.to_string(),
            },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_categories() {
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(409), ErrorCategory::Conflict);
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Unauthorized);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Unauthorized);
        assert_eq!(ErrorCategory::from_status(400), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(422), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::RateLimited);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(418), ErrorCategory::Other);
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::RateLimited.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_response_message() {
        let err = Error::from_response(422, r#"{"message": "name is required"}"#);
        assert_eq!(err.to_string(), "HTTP 422: name is required");
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.status(), Some(422));

        let err = Error::from_response(502, "bad gateway\n");
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found() {
        assert!(Error::from_response(404, "").is_not_found());
        assert!(!Error::Cancelled.is_not_found());
    }
}
