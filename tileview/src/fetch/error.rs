//! Fetch error types

use std::time::Duration;

use thiserror::Error;

/// Why a block could not be retrieved.
///
/// Errors are `Clone` so one result can be handed to every caller sharing a
/// coalesced fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider could not build a request (block outside the grid,
    /// provider not authenticated). No network I/O took place.
    #[error("No request could be built for {fragment_id}")]
    RequestConstruction { fragment_id: String },

    /// Connection-level failure.
    #[error("Transport failure for {uri}: {message}")]
    Transport { uri: String, message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {uri}")]
    Status { uri: String, status: u16 },

    /// The latency budget ran out.
    #[error("Timed out after {}ms fetching {uri}", .budget.as_millis())]
    Timeout { uri: String, budget: Duration },

    /// The body ended before `Content-Length` bytes arrived.
    #[error("Truncated body from {uri}: expected {expected} bytes, received {received}")]
    Truncated {
        uri: String,
        expected: u64,
        received: u64,
    },

    /// The caller's cancellation token fired.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// URI of the failed request, when one was built.
    pub fn uri(&self) -> Option<&str> {
        match self {
            FetchError::Transport { uri, .. }
            | FetchError::Status { uri, .. }
            | FetchError::Timeout { uri, .. }
            | FetchError::Truncated { uri, .. } => Some(uri),
            FetchError::RequestConstruction { .. } | FetchError::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_uri() {
        let err = FetchError::Status {
            uri: "https://t/1/0/0".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 from https://t/1/0/0");
        assert_eq!(err.uri(), Some("https://t/1/0/0"));
    }

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout {
            uri: "u".to_string(),
            budget: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Timed out after 250ms fetching u");
    }

    #[test]
    fn test_cancelled_has_no_uri() {
        assert!(FetchError::Cancelled.is_cancelled());
        assert_eq!(FetchError::Cancelled.uri(), None);
    }
}
