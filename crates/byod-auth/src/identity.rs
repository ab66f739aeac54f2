//! The authenticated user

use serde::Serialize;

/// A user whose email domain passed the allowlist.
///
/// Fields are private and the constructor is crate-internal: the only way to
/// get an `Identity` is through [`crate::verifier`], which checks the domain
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    email: String,
    domain: String,
    verified: bool,
}

impl Identity {
    pub(crate) fn new(email: String, domain: String, verified: bool) -> Self {
        Self {
            email,
            domain,
            verified,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Lower-cased part after the `@`
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `true` when the identity came from an identity provider assertion,
    /// `false` for a self-reported address
    pub fn verified(&self) -> bool {
        self.verified
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.email)
    }
}
