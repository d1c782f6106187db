//! Error types for the discovery core

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// A failure reported by the service directory backend.
///
/// `code` is the platform error code where one exists; backends without
/// numeric codes use `-1`.
#[derive(Debug, Clone, Error)]
#[error("service directory error {code}: {message}")]
pub struct DirectoryError {
    pub code: i32,
    pub message: String,
}

impl DirectoryError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the advertisement manager and discovery coordinator
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A browse session could not begin
    #[error("discovery could not start: {0}")]
    StartFailed(DirectoryError),

    /// Service registration was rejected by the directory
    #[error("registration failed with platform code {code}")]
    RegistrationFailed { code: i32 },

    /// Single-shot discovery hit its deadline with no valid resolution
    #[error("discovery timed out before any matching service resolved")]
    Timeout,

    /// Stop requested while no advertisement is active
    #[error("no active advertisement")]
    NoActiveAdvertisement,

    /// The directory closed an event channel before delivering its
    /// terminal event
    #[error("service directory closed its event channel")]
    DirectoryClosed,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DiscoveryError {
    /// Stable machine-readable code for callers that bridge results over
    /// a string protocol.
    pub fn code(&self) -> String {
        match self {
            DiscoveryError::StartFailed(_) => "START_FAIL".to_string(),
            DiscoveryError::RegistrationFailed { code } => format!("REG_ERR_{}", code),
            DiscoveryError::Timeout => "TIMEOUT_ERROR".to_string(),
            DiscoveryError::NoActiveAdvertisement => "NO_ACTIVE_ADVERTISEMENT".to_string(),
            DiscoveryError::DirectoryClosed => "DIRECTORY_CLOSED".to_string(),
            DiscoveryError::InvalidConfig(_) => "INVALID_CONFIG".to_string(),
        }
    }
}
