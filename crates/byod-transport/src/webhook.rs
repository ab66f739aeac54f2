//! Webhook delivery of compliance reports
//!
//! The report is POSTed as a flat JSON object. Authentication is HTTP basic
//! when a username and password are configured, otherwise a bearer token when
//! an API key is configured, otherwise none.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::{debug, info};

use crate::types::ComplianceReport;

/// Webhook settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Collector URL
    pub url: String,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Bearer token
    pub api_key: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Checker version, sent in the User-Agent
    pub version: String,
}

impl WebhookConfig {
    pub fn from_settings(settings: &byod_common::ReportConfig) -> Self {
        Self {
            url: settings.webhook_url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            api_key: settings.api_key.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Which credentials will be sent
    pub fn auth(&self) -> WebhookAuth {
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(String::from);

        match (non_empty(&self.username), non_empty(&self.password)) {
            (Some(username), Some(password)) => WebhookAuth::Basic { username, password },
            _ => match non_empty(&self.api_key) {
                Some(token) => WebhookAuth::Bearer(token),
                None => WebhookAuth::None,
            },
        }
    }

    pub fn user_agent(&self) -> String {
        format!("BYOD-Security-Checker/{}", self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAuth {
    Basic { username: String, password: String },
    Bearer(String),
    None,
}

impl WebhookAuth {
    /// Short description for logs, without secrets
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookAuth::Basic { .. } => "basic",
            WebhookAuth::Bearer(_) => "bearer",
            WebhookAuth::None => "none",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<ReportError> for byod_core::Error {
    fn from(err: ReportError) -> Self {
        byod_core::Error::ReportDelivery(err.to_string())
    }
}

/// Somewhere a finished report can be sent
#[async_trait::async_trait]
pub trait Reporter: Send + Sync {
    async fn deliver(&self, report: &ComplianceReport) -> Result<(), ReportError>;
}

/// Posts reports to the collector webhook
pub struct WebhookReporter {
    config: WebhookConfig,
    http: Client,
}

impl WebhookReporter {
    pub fn new(config: WebhookConfig) -> Result<Self, ReportError> {
        let http = client_builder(&config)?.build()?;
        Ok(Self { config, http })
    }
}

fn client_builder(config: &WebhookConfig) -> Result<ClientBuilder, ReportError> {
    if config.url.trim().is_empty() {
        return Err(ReportError::NotConfigured("webhook URL is empty".into()));
    }

    Ok(Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent()))
}

#[async_trait::async_trait]
impl Reporter for WebhookReporter {
    async fn deliver(&self, report: &ComplianceReport) -> Result<(), ReportError> {
        let auth = self.config.auth();
        debug!(auth = auth.kind(), "Sending report to collector");

        let mut request = self.http.post(&self.config.url).json(&report.flatten());
        request = match auth {
            WebhookAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            WebhookAuth::Bearer(token) => request.bearer_auth(token),
            WebhookAuth::None => request,
        };

        let res = request.send().await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(ReportError::Api {
                status,
                message: text,
            });
        }

        info!("Report delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_report;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Received {
        authorization: Option<String>,
        user_agent: Option<String>,
        body: serde_json::Value,
    }

    type Inbox = Arc<Mutex<Vec<Received>>>;

    async fn collect(
        State((inbox, status)): State<(Inbox, StatusCode)>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        inbox.lock().unwrap().push(Received {
            authorization: header("authorization"),
            user_agent: header("user-agent"),
            body,
        });
        status
    }

    /// Stand-in collector on an ephemeral port
    async fn collector(status: StatusCode) -> (String, Inbox) {
        let inbox: Inbox = Arc::default();
        let app = Router::new()
            .route("/webhook", post(collect))
            .with_state((inbox.clone(), status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/webhook", addr), inbox)
    }

    fn config(url: String) -> WebhookConfig {
        WebhookConfig {
            url,
            username: None,
            password: None,
            api_key: None,
            request_timeout: Duration::from_secs(5),
            version: "1.0.0".into(),
        }
    }

    fn reporter(config: WebhookConfig) -> WebhookReporter {
        let http = client_builder(&config).unwrap().no_proxy().build().unwrap();
        WebhookReporter { config, http }
    }

    #[test]
    fn test_auth_selection() {
        let mut cfg = config("http://collector".into());
        assert_eq!(cfg.auth(), WebhookAuth::None);

        cfg.api_key = Some("token".into());
        assert_eq!(cfg.auth(), WebhookAuth::Bearer("token".into()));

        cfg.username = Some("svc".into());
        assert_eq!(cfg.auth(), WebhookAuth::Bearer("token".into()));

        cfg.password = Some("secret".into());
        assert_eq!(
            cfg.auth(),
            WebhookAuth::Basic {
                username: "svc".into(),
                password: "secret".into()
            }
        );

        cfg.password = Some(String::new());
        assert_eq!(cfg.auth().kind(), "bearer");
    }

    #[test]
    fn test_empty_url_is_not_configured() {
        let err = WebhookReporter::new(config(String::new())).err().unwrap();
        assert!(matches!(err, ReportError::NotConfigured(_)));

        let core: byod_core::Error = err.into();
        assert_eq!(core.code(), "REPORT_DELIVERY");
    }

    #[tokio::test]
    async fn test_delivers_flat_report_with_basic_auth() {
        let (url, inbox) = collector(StatusCode::OK).await;
        let mut cfg = config(url);
        cfg.username = Some("svc".into());
        cfg.password = Some("secret".into());

        reporter(cfg).deliver(&sample_report()).await.unwrap();

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        // base64("svc:secret")
        assert_eq!(received[0].authorization.as_deref(), Some("Basic c3ZjOnNlY3JldA=="));
        assert_eq!(
            received[0].user_agent.as_deref(),
            Some("BYOD-Security-Checker/1.0.0")
        );
        assert_eq!(received[0].body["user_email"], "alice@saas.group");
        assert_eq!(received[0].body["encryption_status"], false);
        assert_eq!(received[0].body["failed_checks"], "disk_encryption");
    }

    #[tokio::test]
    async fn test_bearer_and_no_auth() {
        let (url, inbox) = collector(StatusCode::OK).await;

        let mut cfg = config(url.clone());
        cfg.api_key = Some("k-123".into());
        reporter(cfg).deliver(&sample_report()).await.unwrap();
        reporter(config(url)).deliver(&sample_report()).await.unwrap();

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received[0].authorization.as_deref(), Some("Bearer k-123"));
        assert_eq!(received[1].authorization, None);
    }

    #[tokio::test]
    async fn test_collector_rejection_is_an_error() {
        let (url, _inbox) = collector(StatusCode::UNAUTHORIZED).await;

        let err = reporter(config(url)).deliver(&sample_report()).await.unwrap_err();
        assert!(matches!(err, ReportError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_collector() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = reporter(config(format!("http://127.0.0.1:{}/webhook", port)))
            .deliver(&sample_report())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Http(_)));
    }
}
