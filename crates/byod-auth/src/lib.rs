//! BYOD Auth - Identity hand-off between the browser and the checker process
//!
//! This crate provides:
//! - `allowlist`: the approved company domains, shared with the sign-in page
//! - `verifier`: decoding of Google ID tokens and email/domain validation
//! - `listener`: the short-lived local HTTP server the browser calls back into
//! - `browser`: launching the sign-in page in the default browser
//! - `orchestrator`: the state machine tying these together, with email fallback
//!
//! An [`Identity`] can only be obtained from this crate after its domain has
//! passed the allowlist check.

pub mod allowlist;
pub mod assets;
pub mod browser;
pub mod error;
pub mod identity;
pub mod listener;
pub mod orchestrator;
pub mod verifier;

pub use allowlist::{allowed_domains, is_allowed};
pub use assets::SigninPage;
pub use browser::{signin_url, BrowserLauncher, SystemBrowser};
pub use byod_common::AuthMethod;
pub use error::{LaunchError, ListenerError, VerificationError};
pub use identity::Identity;
pub use listener::{
    CallbackListener, CallbackResult, CallbackStatus, ListenerSession, PortRange, SessionState,
};
pub use orchestrator::{
    AuthAttempt, AuthFailure, AuthOrchestrator, AuthOutcome, AuthState, UserInteraction,
};
pub use verifier::{identity_from_email, verify};
