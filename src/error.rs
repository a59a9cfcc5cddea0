//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Every
//! error projects onto the closed [`ErrorKind`] taxonomy that the
//! orchestrators store in their state.

use crate::models::FlowKind;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Image service error: {0}")]
    Service(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Another {0} request is already in flight")]
    ConcurrentRequest(FlowKind),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classifies this error for the state machine and the presentation layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Decode(_) => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
            Error::Http(_) | Error::Serialization(_) | Error::Service(_) => ErrorKind::Service,
            Error::Platform(_) | Error::Config(_) => ErrorKind::Platform,
            Error::ConcurrentRequest(_) => ErrorKind::ConcurrentRequest,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed failure taxonomy exposed through `OrchestratorState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty prompt or missing source image. No service call was made.
    InvalidInput,
    /// The source file could not be read.
    Io,
    /// The external service rejected or failed the call.
    Service,
    /// Saving the result failed, or the environment is unusable.
    Platform,
    /// A request for the same flow is still pending.
    ConcurrentRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::Io => "io",
            ErrorKind::Service => "service",
            ErrorKind::Platform => "platform",
            ErrorKind::ConcurrentRequest => "concurrent request",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_classify_as_service() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Service);
        assert_eq!(Error::Service("boom".into()).kind(), ErrorKind::Service);
    }

    #[test]
    fn test_io_and_platform_stay_distinct() {
        let io: Error = std::io::Error::other("unreadable").into();
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(Error::Platform("no disk".into()).kind(), ErrorKind::Platform);
    }

    #[test]
    fn test_decode_error_is_invalid_input() {
        let err: Error = base64::DecodeError::InvalidLength(3).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_concurrent_request_message_names_flow() {
        let err = Error::ConcurrentRequest(FlowKind::Edit);
        assert_eq!(err.kind(), ErrorKind::ConcurrentRequest);
        assert_eq!(err.to_string(), "Another edit request is already in flight");
    }
}
