//! Error type recorded on a finished request.
//!
//! # Design
//! There is a single taxonomy: whatever went wrong, the request attempt is
//! over and the error lands in the outcome for the caller to inspect. The
//! enum is `Clone + Eq` because it is stored in the shared outcome and handed
//! to `network_bad_validator`. Underlying library errors are flattened to
//! their message so no non-`Clone` source is kept.

use thiserror::Error;

/// Errors that end a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Scheme, host and path did not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The request parameters could not be encoded for the configured
    /// request serializer.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The transport could not reach the server or lost the connection.
    #[error("network error: {0}")]
    Network(String),

    /// The transport gave up waiting for the server.
    #[error("request timed out")]
    Timeout,

    /// `stop()` was called before the task completed.
    #[error("request cancelled")]
    Cancelled,

    /// A response arrived but `status_code_validator` rejected its status.
    #[error("unacceptable status code {status}")]
    InvalidStatus { status: u16 },

    /// The response body could not be decoded for the configured response
    /// serializer.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The worker thread for the task could not be started.
    #[error("failed to spawn request task: {0}")]
    TaskSpawn(String),
}

impl RequestError {
    /// True for failures raised by the transport layer itself, as opposed to
    /// failures while preparing the request or interpreting the response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RequestError::Network(_) | RequestError::Timeout | RequestError::Cancelled
        )
    }
}
