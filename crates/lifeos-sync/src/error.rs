//! Sync error types.
//!
//! [`SyncError`] is the unified error for every network-facing operation.
//! The gateway turns it into the single session-level error string shown to
//! the user (see [`SyncError::user_message`]); callers that care about the
//! kind can match on the variant.

use lifeos_core::CoreError;

/// Failures of the request/response API, the push channel, or configuration.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request could not complete (connect, timeout, closed socket).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a structured failure.
    #[error("{message}")]
    Application { status: Option<u16>, message: String },

    /// The server (or the local tree) does not know the referenced node.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing token, rejected token, or failed push-channel handshake.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Human-readable text for the session error banner.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Application { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Maps a non-success HTTP status and its `error` text to an error kind.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => SyncError::AuthFailure(message),
            404 => SyncError::NotFound(message),
            _ => SyncError::Application {
                status: Some(status),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NodeNotFound { .. } | CoreError::ParentNotFound { .. } => {
                SyncError::NotFound(err.to_string())
            }
            CoreError::DuplicateNode { .. }
            | CoreError::InvalidHierarchy { .. }
            | CoreError::MoveIntoSubtree { .. } => SyncError::Application {
                status: None,
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            SyncError::from_status(401, "no".into()),
            SyncError::AuthFailure(_)
        ));
        assert!(matches!(
            SyncError::from_status(404, "gone".into()),
            SyncError::NotFound(_)
        ));
        let err = SyncError::from_status(500, "Database unavailable".into());
        assert!(matches!(
            err,
            SyncError::Application {
                status: Some(500),
                ..
            }
        ));
        assert_eq!(err.user_message(), "Database unavailable");
    }

    #[test]
    fn core_rejections_map_to_kinds() {
        let err: SyncError = CoreError::NodeNotFound { id: "x".into() }.into();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
