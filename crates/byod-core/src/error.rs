//! Error types for the BYOD compliance checker

use thiserror::Error;

/// Result type alias using the checker's Error
pub type Result<T> = std::result::Result<T, Error>;

/// BYOD checker error types
#[derive(Error, Debug)]
pub enum Error {
    // === Authentication Errors ===
    #[error("Malformed identity token: {0}")]
    MalformedToken(String),

    #[error("Email domain '{domain}' is not an approved company domain")]
    DomainNotAllowed { domain: String },

    #[error("No available port for the sign-in listener in {min}-{max}")]
    NoAvailablePort { min: u16, max: u16 },

    #[error("Could not open browser: {0}")]
    LaunchFailed(String),

    #[error("Authentication timed out after {seconds}s")]
    AuthTimeout { seconds: u64 },

    #[error("Authentication denied: {0}")]
    AuthDenied(String),

    // === Reporting Errors ===
    #[error("Report delivery failed: {0}")]
    ReportDelivery(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error ends the authentication attempt (as opposed to
    /// degrading to fallback or being reported as a warning)
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::MalformedToken(_)
                | Error::DomainNotAllowed { .. }
                | Error::AuthTimeout { .. }
                | Error::AuthDenied(_)
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedToken(_) => "MALFORMED_TOKEN",
            Error::DomainNotAllowed { .. } => "DOMAIN_NOT_ALLOWED",
            Error::NoAvailablePort { .. } => "NO_AVAILABLE_PORT",
            Error::LaunchFailed(_) => "LAUNCH_FAILED",
            Error::AuthTimeout { .. } => "AUTH_TIMEOUT",
            Error::AuthDenied(_) => "AUTH_DENIED",
            Error::ReportDelivery(_) => "REPORT_DELIVERY",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
