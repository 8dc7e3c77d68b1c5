//! Error types for Vigil operations
//!
//! Capture failures are deliberately soft: a sub-engine that cannot activate
//! degrades the tracker instead of failing the install, and a sink that
//! rejects an event is logged and forgotten. The only hard errors are the
//! ones a caller can act on (bad configuration, using the tracker before
//! installing it, a broken identity store).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

/// Errors that can occur in Vigil operations
#[derive(Error, Debug)]
pub enum VigilError {
    /// A sub-engine could not activate. Logged and skipped during install;
    /// never fatal to the tracker as a whole.
    #[error("Capture engine '{engine}' failed to activate: {reason}")]
    CaptureFailure { engine: String, reason: String },

    /// A configuration field holds an explicitly out-of-range value
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    /// An operation that requires an installed tracker was called while inactive
    #[error("Tracker is not active. Call install() first.")]
    NotActive,

    /// Address discovery exceeded its timeout. Internal; callers see the
    /// placeholder address instead of this error.
    #[error("Address discovery timed out after {timeout_ms}ms")]
    DiscoveryTimeout { timeout_ms: u64 },

    /// The sink rejected an event. Logged at the emission site, never
    /// propagated to the code that triggered the capture.
    #[error("Sink rejected event: {reason}")]
    SinkFailure { reason: String },

    /// The durable identity store failed to read or write
    #[error("Identity store error: {reason}")]
    IdentityStoreFailure { reason: String },

    /// A state lock is poisoned (panic occurred while holding it)
    #[error("Tracker state lock poisoned. This is a bug; please report it.")]
    StateLocked,

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl VigilError {
    /// Returns the stable error code for this error
    ///
    /// Codes are uppercase, underscore-separated identifiers that remain
    /// stable across versions, suitable for logging and client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            VigilError::CaptureFailure { .. } => "CAPTURE_FAILURE",
            VigilError::InvalidConfig { .. } => "INVALID_CONFIG",
            VigilError::NotActive => "NOT_ACTIVE",
            VigilError::DiscoveryTimeout { .. } => "DISCOVERY_TIMEOUT",
            VigilError::SinkFailure { .. } => "SINK_FAILURE",
            VigilError::IdentityStoreFailure { .. } => "IDENTITY_STORE_FAILURE",
            VigilError::StateLocked => "STATE_LOCKED",
            VigilError::JsonError(_) => "JSON_ERROR",
        }
    }

    /// Returns true if this error might succeed on retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VigilError::DiscoveryTimeout { .. }
                | VigilError::SinkFailure { .. }
                | VigilError::StateLocked
        )
    }
}

/// JSON-serializable error detail for host surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "INVALID_CONFIG")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Whether retry might succeed
    pub recoverable: bool,
}

impl VigilError {
    /// Converts this error to a JSON-serializable detail object
    pub fn to_detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.error_code().to_string(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
        }
    }
}
