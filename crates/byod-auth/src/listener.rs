//! Local callback listener
//!
//! A short-lived HTTP server on the loopback interface. It serves the sign-in
//! page and accepts a single `POST /auth-complete` from the browser once the
//! user has signed in. The first callback is authoritative; later ones are
//! acknowledged and dropped.
//!
//! The browser is sent to `localhost`, which may resolve to `::1` before
//! `127.0.0.1`. A port only counts as free when both loopback addresses can
//! be bound, and both are served. Hosts without IPv6 loopback get IPv4 only.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assets::SigninPage;
use crate::error::ListenerError;
use crate::verifier;

/// How long in-flight requests get to finish once the session is stopped
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Inclusive range of ports to try, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn from_config(config: &byod_common::AuthConfig) -> Self {
        Self::new(config.port_range_start, config.port_range_end)
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.min..=self.max
    }
}

/// Lifecycle of a listener session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Listening,
    Received,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
    Success,
    Denied,
    Error,
}

/// What the browser told us, or why it never did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResult {
    pub status: CallbackStatus,
    pub email: Option<String>,
    pub message: Option<String>,
}

impl CallbackResult {
    pub fn success(email: impl Into<String>) -> Self {
        Self {
            status: CallbackStatus::Success,
            email: Some(email.into()),
            message: None,
        }
    }

    pub fn denied(email: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: CallbackStatus::Denied,
            email,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CallbackStatus::Error,
            email: None,
            message: Some(message.into()),
        }
    }

    pub fn timeout() -> Self {
        Self::error("timeout")
    }

    pub fn is_timeout(&self) -> bool {
        self.status == CallbackStatus::Error && self.message.as_deref() == Some("timeout")
    }
}

/// Body posted by the sign-in page
#[derive(Debug, Deserialize)]
struct AuthCompleteBody {
    email: Option<String>,
    /// Raw Google ID token, when the page forwards it
    credential: Option<String>,
}

#[derive(Clone)]
struct ListenerState {
    page: Arc<SigninPage>,
    result: watch::Sender<Option<CallbackResult>>,
}

/// Entry point for starting sessions
pub struct CallbackListener;

impl CallbackListener {
    /// Bind the first free loopback port in `range` and start serving.
    ///
    /// Ports are tried one at a time, lowest first. A port is used only if it
    /// binds on both loopback addresses; any bind error moves on to the next
    /// port. Running out of ports is `NoAvailablePort`.
    pub async fn start(range: PortRange, page: SigninPage) -> Result<ListenerSession, ListenerError> {
        let bound = bind_first_free(range).await?;
        let addr = bound.v4.local_addr()?;

        let (result_tx, result_rx) = watch::channel(None);
        let state = ListenerState {
            page: Arc::new(page),
            result: result_tx,
        };

        let app = Router::new()
            .route("/", get(signin_page))
            .route("/signin", get(signin_page))
            .route("/health", get(health))
            .route("/auth-complete", post(auth_complete))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ipv6 = bound.v6.is_some();
        let server = tokio::spawn(async move {
            let v4 = serve(bound.v4, app.clone(), shutdown_rx.clone());
            match bound.v6 {
                Some(v6) => {
                    tokio::join!(v4, serve(v6, app, shutdown_rx));
                }
                None => v4.await,
            }
        });

        info!(port = addr.port(), ipv6, "Callback listener started");

        Ok(ListenerSession {
            port: addr.port(),
            bound_at: Utc::now(),
            result_rx,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
            closed: false,
        })
    }
}

async fn serve(listener: TcpListener, app: Router, mut shutdown: watch::Receiver<bool>) {
    let stopped = async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stopped).await {
        warn!("Callback listener stopped with error: {}", e);
    }
}

/// Loopback sockets sharing one port
struct BoundPort {
    v4: TcpListener,
    v6: Option<TcpListener>,
}

async fn bind_first_free(range: PortRange) -> Result<BoundPort, ListenerError> {
    let ipv6 = TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, 0)))
        .await
        .is_ok();
    if !ipv6 {
        debug!("No IPv6 loopback, listening on 127.0.0.1 only");
    }

    for port in range.ports() {
        let v4 = match TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await {
            Ok(listener) => listener,
            Err(e) => {
                debug!(port, error = %e, "Port unavailable, trying next");
                continue;
            }
        };

        if !ipv6 {
            return Ok(BoundPort { v4, v6: None });
        }

        match TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, port))).await {
            Ok(v6) => return Ok(BoundPort { v4, v6: Some(v6) }),
            Err(e) => debug!(port, error = %e, "Port taken on ::1, trying next"),
        }
    }

    Err(ListenerError::NoAvailablePort {
        min: range.min,
        max: range.max,
    })
}

/// A bound, running listener. Owns the server task.
pub struct ListenerSession {
    port: u16,
    bound_at: DateTime<Utc>,
    result_rx: watch::Receiver<Option<CallbackResult>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    server: Option<JoinHandle<()>>,
    closed: bool,
}

impl ListenerSession {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bound_at(&self) -> DateTime<Utc> {
        self.bound_at
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.result_rx.borrow().is_some() {
            SessionState::Received
        } else {
            SessionState::Listening
        }
    }

    /// Wait for the browser's callback.
    ///
    /// On timeout the session is stopped before this returns, and the result
    /// is `CallbackResult::timeout()`.
    pub async fn await_result(&mut self, timeout: Duration) -> CallbackResult {
        let received =
            match tokio::time::timeout(timeout, self.result_rx.wait_for(Option::is_some)).await {
                Ok(Ok(slot)) => slot.clone(),
                Ok(Err(_)) => Some(CallbackResult::error("callback listener stopped unexpectedly")),
                Err(_) => None,
            };

        match received {
            Some(result) => result,
            None => {
                debug!(port = self.port, "No callback within {:?}", timeout);
                self.stop().await;
                CallbackResult::timeout()
            }
        }
    }

    /// Release the port. Safe to call more than once.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
                server.abort();
                let _ = server.await;
            }
            debug!(port = self.port, "Callback listener stopped");
        }

        self.closed = true;
    }
}

impl Drop for ListenerSession {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

async fn signin_page(State(state): State<ListenerState>) -> Html<String> {
    Html(state.page.html().to_string())
}

async fn health() -> &'static str {
    "ok"
}

async fn auth_complete(
    State(state): State<ListenerState>,
    body: Result<Json<AuthCompleteBody>, JsonRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Rejected callback body: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "status": "error", "message": rejection.body_text() })),
            );
        }
    };

    let Some(email) = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "status": "error", "message": "missing email" })),
        );
    };

    let result = evaluate(email, body.credential.as_deref());

    let accepted = state.result.send_if_modified(|slot| {
        if slot.is_some() {
            false
        } else {
            *slot = Some(result.clone());
            true
        }
    });

    if !accepted {
        debug!("Ignoring duplicate callback");
        return (StatusCode::OK, Json(serde_json::json!({ "status": "ignored" })));
    }

    match result.status {
        CallbackStatus::Success => {
            info!("Sign-in callback received");
            (StatusCode::OK, Json(serde_json::json!({ "status": "success" })))
        }
        _ => {
            warn!("Sign-in callback rejected: {}", result.message.as_deref().unwrap_or(""));
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "status": "denied", "message": result.message })),
            )
        }
    }
}

/// Re-apply the domain policy to what the browser posted
fn evaluate(email: &str, credential: Option<&str>) -> CallbackResult {
    if let Some(credential) = credential {
        match verifier::verify(credential) {
            Ok(identity) if identity.email().eq_ignore_ascii_case(email) => {}
            Ok(identity) => {
                return CallbackResult::denied(
                    Some(email.to_string()),
                    format!(
                        "credential was issued for {} but the page posted {}",
                        identity.email(),
                        email
                    ),
                )
            }
            Err(e) => return CallbackResult::denied(Some(email.to_string()), e.to_string()),
        }
    }

    match verifier::identity_from_email(email, true) {
        Ok(_) => CallbackResult::success(email),
        Err(e) => CallbackResult::denied(Some(email.to_string()), e.to_string()),
    }
}
