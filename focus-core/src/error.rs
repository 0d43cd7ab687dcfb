//! Error types for focus operations

use thiserror::Error;

/// Main error type for focus operations
#[derive(Debug, Error)]
pub enum FocusError {
    /// A session was requested with a non-positive duration
    #[error("Focus duration must be a positive number of minutes")]
    InvalidDuration,

    /// A block entry with the same name (case-insensitive) already exists
    #[error("Name '{0}' already exists.")]
    DuplicateName(String),

    /// The host of a block entry is not a bare domain
    #[error("Invalid host '{0}': expected a bare domain such as example.com")]
    InvalidHost(String),

    /// A message set was built from an empty list
    #[error("Message set must contain at least one message")]
    EmptyMessageSet,

    /// Network-related errors (binding the proxy listener, proxy runtime)
    #[error("Network error: {0}")]
    Network(String),

    /// Certificate-related errors
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// OS system proxy registration errors
    #[error("System proxy error: {0}")]
    SystemProxy(String),

    /// Blocklist or message file errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Logging setup errors
    #[error("Logging error: {0}")]
    Logging(String),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FocusError {
    /// Whether the error is a usage error: reported to the user with no state change
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            FocusError::InvalidDuration | FocusError::DuplicateName(_) | FocusError::InvalidHost(_)
        )
    }
}
