//! Error types for the sync service SDK.

use thiserror::Error;

/// Errors produced while supervising the sync service.
#[derive(Debug, Error)]
pub enum Error {
    /// The service binary could not be located.
    #[error("Sync service binary not found: {0}")]
    BinaryNotFound(String),

    /// The OS refused to spawn the process (missing, not executable, ...).
    #[error("Failed to spawn sync service: {0}")]
    Spawn(String),

    /// A running process could not be observed or controlled.
    #[error("Process error: {0}")]
    Process(String),

    /// The process exited before it reported readiness.
    #[error("Sync service exited during startup (exit code: {exit_code:?})")]
    StartupFailed { exit_code: Option<i32> },

    /// The configuration file does not hold a credential yet.
    #[error("API key not available yet")]
    CredentialUnavailable,

    /// The administrative endpoint could not be reached at all.
    #[error("Sync service endpoint unreachable: {0}")]
    RemoteUnreachable(String),

    /// The administrative endpoint rejected the credential.
    #[error("Sync service rejected the API key (HTTP {status})")]
    RemoteAuth { status: u16 },

    /// The administrative endpoint answered with a non-success status.
    #[error("Sync service request failed (HTTP {status})")]
    RemoteStatus { status: u16 },

    /// No home directory was ever configured for the service.
    #[error("No home directory configured for the sync service")]
    NoHomeDirectory,

    /// Invalid supervisor configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the service answered but refused the API key.
    ///
    /// A stop that fails this way leaves the service running; every other
    /// remote failure falls back to killing the process.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Error::RemoteAuth { .. })
    }
}

/// Result type alias for the SDK.
pub type Result<T> = std::result::Result<T, Error>;
