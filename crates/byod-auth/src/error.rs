//! Error types for the authentication hand-off

use thiserror::Error;

/// Why an email address or identity token was rejected.
///
/// `MalformedToken` means the browser or the identity provider handed us
/// something we cannot interpret (an integration bug). `DomainNotAllowed`
/// is a policy decision. They are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("domain '{domain}' is not an approved company domain")]
    DomainNotAllowed { domain: String },
}

/// Callback listener errors
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("no available port in {min}-{max}")]
    NoAvailablePort { min: u16, max: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The default browser could not be opened
#[derive(Debug, Error)]
#[error("could not open {url}: {reason}")]
pub struct LaunchError {
    pub url: String,
    pub reason: String,
}

impl From<VerificationError> for byod_core::Error {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedToken(msg) => byod_core::Error::MalformedToken(msg),
            VerificationError::DomainNotAllowed { domain } => {
                byod_core::Error::DomainNotAllowed { domain }
            }
        }
    }
}

impl From<ListenerError> for byod_core::Error {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::NoAvailablePort { min, max } => {
                byod_core::Error::NoAvailablePort { min, max }
            }
            ListenerError::Io(e) => byod_core::Error::Io(e),
        }
    }
}

impl From<LaunchError> for byod_core::Error {
    fn from(err: LaunchError) -> Self {
        byod_core::Error::LaunchFailed(err.to_string())
    }
}
