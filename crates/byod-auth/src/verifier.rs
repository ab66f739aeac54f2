//! Credential verification
//!
//! Google ID tokens are JWTs. The payload is decoded locally without calling
//! a verification endpoint: the signature was already checked by Google's
//! client library in the browser, and this process only re-applies the
//! domain policy.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::allowlist;
use crate::error::VerificationError;
use crate::identity::Identity;

/// Claims we read from the ID token payload
#[derive(Debug, Deserialize)]
struct TokenClaims {
    email: Option<String>,
}

/// Decode a raw ID token and turn its `email` claim into an [`Identity`].
pub fn verify(raw_token: &str) -> Result<Identity, VerificationError> {
    let claims = decode_claims(raw_token)?;
    let email = claims
        .email
        .ok_or_else(|| VerificationError::MalformedToken("token has no email claim".into()))?;

    identity_from_email(&email, true)
}

/// Validate an email address against the allowlist.
///
/// `verified` records whether the address came from an identity provider
/// (`true`) or was typed in by the user (`false`).
pub fn identity_from_email(email: &str, verified: bool) -> Result<Identity, VerificationError> {
    let email = email.trim();
    let domain = domain_of(email)?;

    if !allowlist::is_allowed(&domain) {
        debug!(%domain, "domain rejected by allowlist");
        return Err(VerificationError::DomainNotAllowed { domain });
    }

    Ok(Identity::new(email.to_string(), domain, verified))
}

/// Lower-cased domain of an email address
pub fn domain_of(email: &str) -> Result<String, VerificationError> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| VerificationError::MalformedToken(format!("'{}' has no '@'", email)))?;

    let invalid_char = |c: char| c.is_whitespace() || c.is_control();
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || email.chars().any(invalid_char)
    {
        return Err(VerificationError::MalformedToken(format!(
            "'{}' is not a valid email address",
            email
        )));
    }

    Ok(domain.to_ascii_lowercase())
}

fn decode_claims(raw_token: &str) -> Result<TokenClaims, VerificationError> {
    let mut segments = raw_token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) if !payload.is_empty() => payload,
        _ => {
            return Err(VerificationError::MalformedToken(
                "expected three dot-separated segments".into(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| VerificationError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| VerificationError::MalformedToken(format!("payload is not JSON: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token with the given payload
    pub(crate) fn token_with_payload(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.c2lnbmF0dXJl", header, body)
    }

    #[test]
    fn test_verify_allowed_domain() {
        let token = token_with_payload(&serde_json::json!({
            "iss": "https://accounts.google.com",
            "email": "alice@saas.group",
            "email_verified": true,
        }));

        let identity = verify(&token).unwrap();
        assert_eq!(identity.email(), "alice@saas.group");
        assert_eq!(identity.domain(), "saas.group");
        assert!(identity.verified());
    }

    #[test]
    fn test_domain_is_lowercased_regardless_of_token_case() {
        let token = token_with_payload(&serde_json::json!({ "email": "Alice@SaaS.Group" }));

        let identity = verify(&token).unwrap();
        assert_eq!(identity.domain(), "saas.group");
        assert_eq!(identity.email(), "Alice@SaaS.Group");
    }

    #[test]
    fn test_missing_at_is_malformed_not_denied() {
        let token = token_with_payload(&serde_json::json!({ "email": "alice.saas.group" }));

        let err = verify(&token).unwrap_err();
        assert!(matches!(err, VerificationError::MalformedToken(_)));
    }

    #[test]
    fn test_unapproved_domain_is_denied() {
        let token = token_with_payload(&serde_json::json!({ "email": "bob@example.com" }));

        let err = verify(&token).unwrap_err();
        assert_eq!(
            err,
            VerificationError::DomainNotAllowed {
                domain: "example.com".into()
            }
        );
    }

    #[test]
    fn test_missing_email_claim() {
        let token = token_with_payload(&serde_json::json!({ "sub": "1234567890" }));
        assert!(matches!(
            verify(&token),
            Err(VerificationError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_garbage_tokens_are_malformed() {
        for raw in ["", "not-a-jwt", "a.b", "a.!!!.c", "a.b.c.d"] {
            assert!(
                matches!(verify(raw), Err(VerificationError::MalformedToken(_))),
                "{raw:?} should be malformed"
            );
        }

        let not_json = format!("x.{}.y", URL_SAFE_NO_PAD.encode("hello"));
        assert!(matches!(
            verify(&not_json),
            Err(VerificationError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let body = base64::engine::general_purpose::URL_SAFE
            .encode(serde_json::json!({ "email": "a@saas.group" }).to_string());
        let token = format!("h.{}.s", body);
        assert!(verify(&token).is_ok());
    }

    #[test]
    fn test_self_reported_identity_is_unverified() {
        let identity = identity_from_email("  carol@Usersnap.com ", false).unwrap();
        assert_eq!(identity.email(), "carol@Usersnap.com");
        assert_eq!(identity.domain(), "usersnap.com");
        assert!(!identity.verified());
    }

    #[test]
    fn test_domain_of_rejects_odd_addresses() {
        assert!(domain_of("@saas.group").is_err());
        assert!(domain_of("alice@").is_err());
        assert!(domain_of("a@b@saas.group").is_err());
        assert_eq!(domain_of("a@SAAS.group").unwrap(), "saas.group");
    }

    #[test]
    fn test_whitespace_inside_address_is_malformed() {
        for email in [
            "alice@ saas.group",
            "alice @saas.group",
            "alice@\tsaas.group",
            "alice@saas.group\u{0}",
            "alice@saas .group",
        ] {
            assert!(
                matches!(
                    identity_from_email(email, false),
                    Err(VerificationError::MalformedToken(_))
                ),
                "{email:?} should be malformed"
            );
        }

        let token = token_with_payload(&serde_json::json!({ "email": "alice@ saas.group" }));
        assert!(matches!(verify(&token), Err(VerificationError::MalformedToken(_))));
    }
}
