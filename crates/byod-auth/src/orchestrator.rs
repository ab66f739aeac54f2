//! Authentication state machine
//!
//! ```text
//! INIT -> LISTENING -> AWAITING_BROWSER -> SUCCEEDED
//!   |         |               |         -> DENIED
//!   |         |               |         -> TIMED_OUT -> FALLBACK (if accepted)
//!   +---------+---------------+-----------------------> FALLBACK
//! ```
//!
//! Only `SUCCEEDED`, or `FALLBACK` with an accepted email, yields an
//! [`Identity`].

use std::sync::Arc;

use byod_common::{AuthConfig, AuthMethod};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assets::SigninPage;
use crate::browser::{signin_url, BrowserLauncher};
use crate::error::VerificationError;
use crate::identity::Identity;
use crate::listener::{CallbackListener, CallbackResult, CallbackStatus, PortRange};
use crate::verifier;

/// Attempts at typing a well-formed email before giving up
const MAX_EMAIL_ATTEMPTS: usize = 3;

/// Terminal interaction needed by the orchestrator
///
/// `prompt_email` and `confirm_fallback` may block on the terminal; the
/// orchestrator calls them on the blocking thread pool.
pub trait UserInteraction: Send + Sync + 'static {
    /// Print a progress or status line
    fn show(&self, message: &str);

    /// Ask for a company email address
    fn prompt_email(&self) -> std::io::Result<String>;

    /// Ask whether to continue with email validation
    fn confirm_fallback(&self, reason: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Init,
    Listening,
    AwaitingBrowser,
    Succeeded,
    Denied,
    TimedOut,
    Fallback,
}

impl AuthState {
    pub fn can_transition_to(&self, next: AuthState) -> bool {
        use AuthState::*;
        matches!(
            (self, next),
            (Init, Listening)
                | (Init, Fallback)
                | (Listening, AwaitingBrowser)
                | (Listening, Fallback)
                | (AwaitingBrowser, Succeeded)
                | (AwaitingBrowser, Denied)
                | (AwaitingBrowser, TimedOut)
                | (AwaitingBrowser, Fallback)
                | (TimedOut, Fallback)
        )
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthState::Init => "INIT",
            AuthState::Listening => "LISTENING",
            AuthState::AwaitingBrowser => "AWAITING_BROWSER",
            AuthState::Succeeded => "SUCCEEDED",
            AuthState::Denied => "DENIED",
            AuthState::TimedOut => "TIMED_OUT",
            AuthState::Fallback => "FALLBACK",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthOutcome {
    Pending,
    Success,
    Failure,
}

/// Why an attempt did not produce an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The browser or the user handed over something that is not an email / token
    Malformed(String),
    /// Policy: the domain is not on the allowlist
    DomainNotAllowed { domain: String },
    /// No callback arrived and fallback was not taken
    TimedOut { seconds: u64 },
    /// The email prompt could not be answered
    Cancelled(String),
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::Malformed(msg) => write!(f, "the sign-in response could not be read: {}", msg),
            AuthFailure::DomainNotAllowed { domain } => write!(
                f,
                "'{}' is not a saas.group or portfolio company domain",
                domain
            ),
            AuthFailure::TimedOut { seconds } => {
                write!(f, "no sign-in was completed within {} seconds", seconds)
            }
            AuthFailure::Cancelled(msg) => write!(f, "email entry was cancelled: {}", msg),
        }
    }
}

impl From<VerificationError> for AuthFailure {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedToken(msg) => AuthFailure::Malformed(msg),
            VerificationError::DomainNotAllowed { domain } => AuthFailure::DomainNotAllowed { domain },
        }
    }
}

impl From<AuthFailure> for byod_core::Error {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Malformed(msg) => byod_core::Error::MalformedToken(msg),
            AuthFailure::DomainNotAllowed { domain } => byod_core::Error::DomainNotAllowed { domain },
            AuthFailure::TimedOut { seconds } => byod_core::Error::AuthTimeout { seconds },
            AuthFailure::Cancelled(msg) => byod_core::Error::AuthDenied(msg),
        }
    }
}

/// One authentication attempt per invocation
#[derive(Debug, Clone)]
pub struct AuthAttempt {
    method: AuthMethod,
    identity: Option<Identity>,
    outcome: AuthOutcome,
    state: AuthState,
    failure: Option<AuthFailure>,
}

impl AuthAttempt {
    fn new(method: AuthMethod) -> Self {
        Self {
            method,
            identity: None,
            outcome: AuthOutcome::Pending,
            state: AuthState::Init,
            failure: None,
        }
    }

    /// Method that produced (or failed to produce) the identity
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn outcome(&self) -> AuthOutcome {
        self.outcome
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn failure(&self) -> Option<&AuthFailure> {
        self.failure.as_ref()
    }

    /// Hand the identity onward, or the reason there is none
    pub fn into_result(self) -> byod_core::Result<Identity> {
        match (self.outcome, self.identity, self.failure) {
            (AuthOutcome::Success, Some(identity), _) => Ok(identity),
            (_, _, Some(failure)) => Err(failure.into()),
            _ => Err(byod_core::Error::Internal(format!(
                "authentication ended in {} without an outcome",
                self.state
            ))),
        }
    }

    fn enter(&mut self, next: AuthState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Auth state change");
        self.state = next;
        if next == AuthState::Fallback {
            self.method = AuthMethod::Email;
            self.failure = None;
        }
    }

    fn succeed(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.outcome = AuthOutcome::Success;
        self.failure = None;
    }

    fn fail(&mut self, failure: AuthFailure) {
        self.identity = None;
        self.outcome = AuthOutcome::Failure;
        self.failure = Some(failure);
    }
}

/// Drives the browser hand-off and the email fallback
pub struct AuthOrchestrator {
    config: AuthConfig,
    browser: Box<dyn BrowserLauncher>,
    ui: Arc<dyn UserInteraction>,
}

impl AuthOrchestrator {
    pub fn new(
        config: AuthConfig,
        browser: Box<dyn BrowserLauncher>,
        ui: Box<dyn UserInteraction>,
    ) -> Self {
        Self {
            config,
            browser,
            ui: Arc::from(ui),
        }
    }

    /// Run one authentication attempt to a terminal state
    pub async fn run(&self) -> AuthAttempt {
        let mut attempt = AuthAttempt::new(self.config.method);

        if self.config.method == AuthMethod::Email {
            info!("Email validation requested, skipping Google sign-in");
            attempt.enter(AuthState::Fallback);
            self.email_fallback(&mut attempt).await;
            return attempt;
        }

        if self.config.google_client_id.trim().is_empty() {
            warn!("No Google client id configured, using email validation");
            self.ui
                .show("Google Sign-In is not configured on this machine. Falling back to email validation.");
            attempt.enter(AuthState::Fallback);
            self.email_fallback(&mut attempt).await;
            return attempt;
        }

        let page = SigninPage::new(&self.config.google_client_id);
        let mut session = match CallbackListener::start(PortRange::from_config(&self.config), page).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not start callback listener: {}", e);
                self.ui.show(&format!(
                    "Could not start the local sign-in server ({}). Falling back to email validation.",
                    e
                ));
                attempt.enter(AuthState::Fallback);
                self.email_fallback(&mut attempt).await;
                return attempt;
            }
        };
        attempt.enter(AuthState::Listening);

        let url = signin_url(session.port());
        self.ui.show(&format!("Opening browser: {}", url));
        if let Err(e) = self.browser.open(&url) {
            warn!("{}", e);
            self.ui.show(&format!(
                "Could not open a browser automatically. Open this URL to sign in: {}",
                url
            ));
        }
        attempt.enter(AuthState::AwaitingBrowser);
        self.ui
            .show("Waiting for you to complete Google Sign-In in your browser...");

        let result = session.await_result(self.config.timeout()).await;
        session.stop().await;

        self.settle(&mut attempt, result).await;
        attempt
    }

    async fn prompt_email(&self) -> std::io::Result<String> {
        let ui = Arc::clone(&self.ui);
        tokio::task::spawn_blocking(move || ui.prompt_email())
            .await
            .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    async fn confirm_fallback(&self, reason: String) -> bool {
        let ui = Arc::clone(&self.ui);
        tokio::task::spawn_blocking(move || ui.confirm_fallback(&reason))
            .await
            .unwrap_or(false)
    }

    async fn settle(&self, attempt: &mut AuthAttempt, result: CallbackResult) {
        match result.status {
            CallbackStatus::Success => {
                // The listener already checked; check again before trusting it.
                let email = result.email.unwrap_or_default();
                match verifier::identity_from_email(&email, true) {
                    Ok(identity) => {
                        info!(domain = identity.domain(), "Google sign-in succeeded");
                        attempt.enter(AuthState::Succeeded);
                        attempt.succeed(identity);
                    }
                    Err(e) => {
                        warn!("Browser reported success for a rejected address: {}", e);
                        attempt.enter(AuthState::Denied);
                        attempt.fail(e.into());
                    }
                }
            }
            CallbackStatus::Denied => {
                let failure = match result.email.as_deref().map(|e| verifier::identity_from_email(e, true)) {
                    Some(Err(e)) => AuthFailure::from(e),
                    _ => AuthFailure::Malformed(
                        result
                            .message
                            .unwrap_or_else(|| String::from("sign-in was denied")),
                    ),
                };
                warn!("Google sign-in denied: {}", failure);
                attempt.enter(AuthState::Denied);
                attempt.fail(failure);
            }
            CallbackStatus::Error if result.is_timeout() => {
                let seconds = self.config.timeout_seconds;
                warn!("No sign-in callback within {}s", seconds);
                attempt.enter(AuthState::TimedOut);
                attempt.fail(AuthFailure::TimedOut { seconds });

                let reason = format!("Google Sign-In timed out after {} seconds.", seconds);
                if self.config.fallback_on_timeout && self.confirm_fallback(reason).await {
                    attempt.enter(AuthState::Fallback);
                    self.email_fallback(attempt).await;
                }
            }
            CallbackStatus::Error => {
                let message = result.message.unwrap_or_default();
                warn!("Callback listener failed: {}", message);
                self.ui
                    .show("The local sign-in server failed. Falling back to email validation.");
                attempt.enter(AuthState::Fallback);
                self.email_fallback(attempt).await;
            }
        }
    }

    /// Self-reported email, same allowlist, weaker proof
    async fn email_fallback(&self, attempt: &mut AuthAttempt) {
        for _ in 0..MAX_EMAIL_ATTEMPTS {
            let input = match self.prompt_email().await {
                Ok(input) => input,
                Err(e) => {
                    attempt.fail(AuthFailure::Cancelled(e.to_string()));
                    return;
                }
            };

            match verifier::identity_from_email(&input, false) {
                Ok(identity) => {
                    info!(domain = identity.domain(), "Email validation succeeded");
                    attempt.succeed(identity);
                    return;
                }
                Err(VerificationError::MalformedToken(_)) => {
                    self.ui.show(&format!(
                        "'{}' is not a valid email address. Please try again.",
                        input.trim()
                    ));
                }
                Err(e) => {
                    warn!("Email validation rejected: {}", e);
                    attempt.fail(e.into());
                    return;
                }
            }
        }

        attempt.fail(AuthFailure::Malformed(format!(
            "no valid email address after {} attempts",
            MAX_EMAIL_ATTEMPTS
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaunchError;
    use byod_common::Config;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays the browser: posts `email` back to the listener once opened
    struct PostingBrowser {
        email: &'static str,
    }

    impl BrowserLauncher for PostingBrowser {
        fn open(&self, url: &str) -> Result<(), LaunchError> {
            let port = url
                .trim_start_matches("http://localhost:")
                .split('/')
                .next()
                .unwrap()
                .to_string();
            let email = self.email;
            tokio::spawn(async move {
                let client = reqwest::Client::builder().no_proxy().build().unwrap();
                let _ = client
                    .post(format!("http://127.0.0.1:{}/auth-complete", port))
                    .json(&serde_json::json!({ "email": email }))
                    .send()
                    .await;
            });
            Ok(())
        }
    }

    /// A headless machine
    struct NoBrowser;

    impl BrowserLauncher for NoBrowser {
        fn open(&self, url: &str) -> Result<(), LaunchError> {
            Err(LaunchError {
                url: url.to_string(),
                reason: "no display".into(),
            })
        }
    }

    struct ScriptedUser {
        emails: Mutex<VecDeque<&'static str>>,
        accept_fallback: bool,
        prompted_on: Arc<Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl ScriptedUser {
        fn new(emails: &[&'static str], accept_fallback: bool) -> Box<Self> {
            Box::new(Self {
                emails: Mutex::new(emails.iter().copied().collect()),
                accept_fallback,
                prompted_on: Arc::default(),
            })
        }
    }

    impl UserInteraction for ScriptedUser {
        fn show(&self, _message: &str) {}

        fn prompt_email(&self) -> std::io::Result<String> {
            self.prompted_on.lock().unwrap().push(std::thread::current().id());
            self.emails
                .lock()
                .unwrap()
                .pop_front()
                .map(String::from)
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no input"))
        }

        fn confirm_fallback(&self, _reason: &str) -> bool {
            self.prompted_on.lock().unwrap().push(std::thread::current().id());
            self.accept_fallback
        }
    }

    fn google_config(start: u16, end: u16) -> AuthConfig {
        Config::builder()
            .port_range(start, end)
            .auth_timeout_seconds(10)
            .google_client_id("test-client.apps.googleusercontent.com")
            .build()
            .auth
    }

    #[test]
    fn test_transitions() {
        assert!(AuthState::Init.can_transition_to(AuthState::Listening));
        assert!(AuthState::Init.can_transition_to(AuthState::Fallback));
        assert!(AuthState::AwaitingBrowser.can_transition_to(AuthState::TimedOut));
        assert!(AuthState::TimedOut.can_transition_to(AuthState::Fallback));
        assert!(!AuthState::Succeeded.can_transition_to(AuthState::Fallback));
        assert!(!AuthState::Denied.can_transition_to(AuthState::Fallback));
        assert!(!AuthState::Init.can_transition_to(AuthState::Succeeded));
    }

    #[tokio::test]
    async fn test_browser_sign_in_succeeds() {
        let orchestrator = AuthOrchestrator::new(
            google_config(38200, 38209),
            Box::new(PostingBrowser {
                email: "alice@saas.group",
            }),
            ScriptedUser::new(&[], false),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Succeeded);
        assert_eq!(attempt.outcome(), AuthOutcome::Success);
        assert_eq!(attempt.method(), AuthMethod::Google);

        let identity = attempt.into_result().unwrap();
        assert_eq!(identity.email(), "alice@saas.group");
        assert_eq!(identity.domain(), "saas.group");
        assert!(identity.verified());
    }

    #[tokio::test]
    async fn test_browser_sign_in_with_foreign_domain_is_denied() {
        let orchestrator = AuthOrchestrator::new(
            google_config(38210, 38219),
            Box::new(PostingBrowser {
                email: "bob@example.com",
            }),
            // Would succeed if the orchestrator wrongly fell back
            ScriptedUser::new(&["alice@saas.group"], true),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Denied);
        assert_eq!(attempt.outcome(), AuthOutcome::Failure);
        assert!(attempt.identity().is_none());
        assert_eq!(
            attempt.failure(),
            Some(&AuthFailure::DomainNotAllowed {
                domain: "example.com".into()
            })
        );

        let err = attempt.into_result().unwrap_err();
        assert_eq!(err.code(), "DOMAIN_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_port_exhaustion_falls_back_to_email() {
        let a = std::net::TcpListener::bind(("127.0.0.1", 38220)).unwrap();
        let b = std::net::TcpListener::bind(("127.0.0.1", 38221)).unwrap();

        let orchestrator = AuthOrchestrator::new(
            google_config(38220, 38221),
            Box::new(NoBrowser),
            ScriptedUser::new(&["carol@usersnap.com"], false),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Fallback);
        assert_eq!(attempt.outcome(), AuthOutcome::Success);
        assert_eq!(attempt.method(), AuthMethod::Email);

        let identity = attempt.identity().unwrap();
        assert_eq!(identity.domain(), "usersnap.com");
        assert!(!identity.verified());

        drop((a, b));
    }

    #[tokio::test]
    async fn test_timeout_without_fallback() {
        let mut config = google_config(38230, 38239);
        config.timeout_seconds = 1;
        config.fallback_on_timeout = false;

        let orchestrator = AuthOrchestrator::new(
            config,
            Box::new(NoBrowser),
            ScriptedUser::new(&["alice@saas.group"], true),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::TimedOut);
        assert_eq!(attempt.outcome(), AuthOutcome::Failure);
        assert_eq!(attempt.failure(), Some(&AuthFailure::TimedOut { seconds: 1 }));
        assert_eq!(attempt.into_result().unwrap_err().code(), "AUTH_TIMEOUT");
    }

    #[tokio::test]
    async fn test_timeout_then_accepted_fallback() {
        let mut config = google_config(38240, 38249);
        config.timeout_seconds = 1;

        let orchestrator = AuthOrchestrator::new(
            config,
            Box::new(NoBrowser),
            ScriptedUser::new(&["dave@saas.group"], true),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Fallback);
        assert_eq!(attempt.outcome(), AuthOutcome::Success);
        assert_eq!(attempt.identity().unwrap().email(), "dave@saas.group");
    }

    #[tokio::test]
    async fn test_email_method_skips_browser() {
        let config = Config::builder().auth_method(AuthMethod::Email).build().auth;
        let orchestrator = AuthOrchestrator::new(
            config,
            Box::new(PostingBrowser {
                email: "alice@saas.group",
            }),
            ScriptedUser::new(&["not-an-email", "erin@Zenloop.com"], false),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Fallback);
        assert_eq!(attempt.outcome(), AuthOutcome::Success);
        assert_eq!(attempt.identity().unwrap().domain(), "zenloop.com");
    }

    #[tokio::test]
    async fn test_email_method_rejects_foreign_domain() {
        let config = Config::builder().auth_method(AuthMethod::Email).build().auth;
        let orchestrator = AuthOrchestrator::new(
            config,
            Box::new(NoBrowser),
            ScriptedUser::new(&["eve@gmail.com", "alice@saas.group"], false),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.outcome(), AuthOutcome::Failure);
        assert_eq!(
            attempt.failure(),
            Some(&AuthFailure::DomainNotAllowed {
                domain: "gmail.com".into()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_client_id_falls_back() {
        let config = Config::builder().port_range(38250, 38259).build().auth;
        let orchestrator = AuthOrchestrator::new(
            config,
            Box::new(NoBrowser),
            ScriptedUser::new(&[], false),
        );

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.state(), AuthState::Fallback);
        assert_eq!(attempt.outcome(), AuthOutcome::Failure);
        assert!(matches!(attempt.failure(), Some(AuthFailure::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_prompts_run_off_the_runtime_thread() {
        let mut config = google_config(38190, 38199);
        config.timeout_seconds = 1;

        let user = ScriptedUser::new(&["frank@saas.group"], true);
        let prompted_on = Arc::clone(&user.prompted_on);
        let orchestrator = AuthOrchestrator::new(config, Box::new(NoBrowser), user);

        let attempt = orchestrator.run().await;
        assert_eq!(attempt.outcome(), AuthOutcome::Success);

        let runtime_thread = std::thread::current().id();
        let threads = prompted_on.lock().unwrap().clone();
        // confirm_fallback, then prompt_email
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn test_settle_rechecks_success() {
        let orchestrator = AuthOrchestrator::new(
            google_config(1, 1),
            Box::new(NoBrowser),
            ScriptedUser::new(&[], false),
        );
        let mut attempt = AuthAttempt::new(AuthMethod::Google);
        attempt.enter(AuthState::Listening);
        attempt.enter(AuthState::AwaitingBrowser);

        orchestrator
            .settle(&mut attempt, CallbackResult::success("bob@example.com"))
            .await;
        assert_eq!(attempt.state(), AuthState::Denied);
        assert!(attempt.identity().is_none());
    }
}
