//! Error types for officehunt.
//!
//! This module defines all error types used throughout the officehunt crate,
//! providing detailed context for debugging and user-facing messages for the
//! errors a player can act on.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for officehunt operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The item catalog could not be loaded or is invalid.
    #[error("invalid item catalog: {message}")]
    Catalog {
        /// Description of what went wrong.
        message: String,
    },

    // === Camera Errors ===
    /// No camera stream could be acquired with any constraints.
    #[error("camera unavailable: {message}. Check camera permissions and try again")]
    CameraUnavailable {
        /// Description of the last failure.
        message: String,
    },

    /// The camera has not produced a usable frame yet.
    #[error("camera not ready, please wait...")]
    CameraNotReady,

    // === Image Errors ===
    /// A frame could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A frame could not be encoded.
    #[error("failed to encode image: {message}")]
    ImageEncode {
        /// Description of what went wrong.
        message: String,
    },

    // === Classifier Errors ===
    /// No API key is configured for the vision model.
    #[error("vision model API key is not configured")]
    MissingApiKey,

    /// The classifier answered with a non-success HTTP status.
    #[error("classifier returned HTTP {status}")]
    UpstreamStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The classifier could not be reached.
    #[error("classifier transport error: {0}")]
    Transport(String),

    /// The classifier answered with a body we could not interpret.
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),

    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    // === Request Errors ===
    /// A request to the local endpoint was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // === Game Errors ===
    /// The requested action is not valid in the current game phase.
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        /// The action that was attempted.
        action: &'static str,
        /// The phase the game was in.
        phase: String,
    },

    /// A classification is already in flight for the current item.
    #[error("a capture is already being validated")]
    ValidationInFlight,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for officehunt operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                operation: "classification request".to_string(),
            }
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::UpstreamStatus {
                status: status.as_u16(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl Error {
    /// Create a camera unavailable error.
    #[must_use]
    pub fn camera_unavailable(message: impl Into<String>) -> Self {
        Self::CameraUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid catalog error.
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(action: &'static str, phase: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            action,
            phase: phase.to_string(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if the player can fix this error by trying again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CameraUnavailable { .. } | Self::CameraNotReady | Self::ValidationInFlight
        )
    }

    /// Check if this error came from calling a classifier.
    ///
    /// These are the failures that the fail-open policy converts into an
    /// offline match.
    #[must_use]
    pub fn is_classifier_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey
                | Self::UpstreamStatus { .. }
                | Self::Transport(_)
                | Self::MalformedResponse(_)
                | Self::Timeout { .. }
        )
    }
}
