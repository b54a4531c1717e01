//! Error types for vpgctl
//!
//! [`Error`] covers failures that stop an operation: transport faults,
//! tracking failures and unresolvable targets. Input-quality problems are
//! reported separately and collected per row or per target, see
//! [`crate::loader::RowError`] and [`crate::reconcile::ValidationError`].

use std::time::Duration;

use thiserror::Error;

use crate::model::OperationHandle;

/// Result type alias for vpgctl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vpgctl
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure, timeout or 5xx from the manager. Retryable.
    #[error("Transient transport error: {0}")]
    TransientTransport(String),

    /// The manager rejected the request with a 4xx status
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response text or error message
        message: String,
    },

    /// The manager does not know the operation handle
    #[error("Invalid operation handle: {0}")]
    InvalidHandle(OperationHandle),

    /// The VPG identifier does not resolve
    #[error("VPG not found: {0}")]
    VpgNotFound(String),

    /// A VPG with this name already exists on the manager
    #[error("VPG already exists: {0}")]
    VpgExists(String),

    /// A VM/NIC named by the change-set is absent from the VPG settings
    #[error("Target not found in VPG settings: VM {vm_identifier}, NIC {nic_identifier}")]
    TargetNotFound {
        /// VM identifier
        vm_identifier: String,
        /// NIC identifier
        nic_identifier: String,
    },

    /// Too many transient errors while polling a handle
    #[error("Tracking of {handle} exhausted after {attempts} transient errors: {last_error}")]
    TrackingExhausted {
        /// Handle being tracked
        handle: OperationHandle,
        /// Transient errors observed
        attempts: usize,
        /// The last transient error seen
        last_error: String,
    },

    /// The handle did not reach a terminal state in time.
    ///
    /// The remote operation may still complete after the client stops watching.
    #[error("Timed out tracking {handle} after {elapsed:?}")]
    Timeout {
        /// Handle being tracked
        handle: OperationHandle,
        /// Time spent tracking
        elapsed: Duration,
    },

    /// Credential exchange failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The manager answered with a body we cannot interpret
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transient transport error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientTransport(msg.into())
    }

    /// Create a rejection error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a "target not found" error
    pub fn target_not_found(
        vm_identifier: impl Into<String>,
        nic_identifier: impl Into<String>,
    ) -> Self {
        Self::TargetNotFound {
            vm_identifier: vm_identifier.into(),
            nic_identifier: nic_identifier.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientTransport(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
