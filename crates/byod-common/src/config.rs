//! Configuration management for the BYOD checker

use byod_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collector webhook used when nothing else is configured
pub const DEFAULT_WEBHOOK_URL: &str =
    "https://n8n.saasgroup.app/webhook/5120b2b2-a509-4f63-96e2-fa7f414ec7e2";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Report delivery settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Per-user config file location (`~/.config/byod-check/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("byod-check").join("config.toml"))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (BYOD_ prefix, plus the collector's N8N_ names)
    pub fn merge_env(self) -> Self {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    fn merge_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Auth settings
        if let Some(val) = lookup("BYOD_AUTH_METHOD") {
            if let Ok(method) = val.parse() {
                self.auth.method = method;
            }
        }
        if let Some(val) = lookup("BYOD_GOOGLE_CLIENT_ID") {
            self.auth.google_client_id = val;
        }
        if let Some(val) = lookup("BYOD_AUTH_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.auth.timeout_seconds = n;
            }
        }

        // Report settings
        if let Some(val) = lookup("BYOD_WEBHOOK_URL").or_else(|| lookup("N8N_WEBHOOK_URL")) {
            self.report.webhook_url = val;
        }
        if let Some(val) = lookup("N8N_USERNAME") {
            self.report.username = Some(val);
        }
        if let Some(val) = lookup("N8N_PASSWORD") {
            self.report.password = Some(val);
        }
        if let Some(val) = lookup("N8N_API_KEY") {
            self.report.api_key = Some(val);
        }

        // Logging
        if let Some(val) = lookup("BYOD_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("BYOD_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }

    /// Reject values the checker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.port_range_start > self.auth.port_range_end {
            return Err(Error::InvalidConfig {
                key: "auth.port_range_start".into(),
                message: format!(
                    "{} is greater than port_range_end {}",
                    self.auth.port_range_start, self.auth.port_range_end
                ),
            });
        }
        if self.auth.timeout_seconds == 0 {
            return Err(Error::InvalidConfig {
                key: "auth.timeout_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.report.enabled && self.report.webhook_url.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "report.webhook_url".into(),
                message: "reporting is enabled but no webhook URL is set".into(),
            });
        }
        Ok(())
    }
}

/// How the user proves their identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Google Sign-In through the browser
    #[default]
    Google,
    /// Self-reported email address
    Email,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Google => "google",
            AuthMethod::Email => "email",
        }
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(AuthMethod::Google),
            "email" => Ok(AuthMethod::Email),
            other => Err(Error::InvalidConfig {
                key: "auth.method".into(),
                message: format!("unknown method '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Preferred authentication method
    #[serde(default)]
    pub method: AuthMethod,

    /// First port tried for the sign-in listener
    #[serde(default = "default_port_start")]
    pub port_range_start: u16,

    /// Last port tried for the sign-in listener (inclusive)
    #[serde(default = "default_port_end")]
    pub port_range_end: u16,

    /// How long to wait for the browser, in seconds
    #[serde(default = "default_auth_timeout")]
    pub timeout_seconds: u64,

    /// Public OAuth client identifier embedded in the sign-in page
    #[serde(default)]
    pub google_client_id: String,

    /// Offer email validation when the browser never calls back
    #[serde(default = "default_true")]
    pub fallback_on_timeout: bool,
}

fn default_port_start() -> u16 {
    8080
}

fn default_port_end() -> u16 {
    8089
}

fn default_auth_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::Google,
            port_range_start: 8080,
            port_range_end: 8089,
            timeout_seconds: 300,
            google_client_id: String::new(),
            fallback_on_timeout: true,
        }
    }
}

/// Report delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Send results to the collector
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Collector webhook URL
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Bearer token, used when no basic auth credentials are set
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_webhook_url() -> String {
    String::from(DEFAULT_WEBHOOK_URL)
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: default_webhook_url(),
            username: None,
            password: None,
            api_key: None,
            request_timeout_seconds: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("warn")
}

fn default_log_format() -> String {
    String::from("compact")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn auth_method(mut self, method: AuthMethod) -> Self {
        self.config.auth.method = method;
        self
    }

    pub fn port_range(mut self, start: u16, end: u16) -> Self {
        self.config.auth.port_range_start = start;
        self.config.auth.port_range_end = end;
        self
    }

    pub fn auth_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.auth.timeout_seconds = seconds;
        self
    }

    pub fn google_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.google_client_id = client_id.into();
        self
    }

    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.report.webhook_url = url.into();
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.report.username = Some(username.into());
        self.config.report.password = Some(password.into());
        self
    }

    pub fn reporting(mut self, enabled: bool) -> Self {
        self.config.report.enabled = enabled;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [auth]
            method = "email"
            port_range_start = 9000
            port_range_end = 9004
            google_client_id = "1234.apps.googleusercontent.com"

            [report]
            webhook_url = "https://collector.example.com/hook"
            username = "svc"
            password = "secret"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::Email);
        assert_eq!(config.auth.port_range_start, 9000);
        assert_eq!(config.auth.port_range_end, 9004);
        assert_eq!(config.auth.timeout_seconds, 300);
        assert!(config.auth.fallback_on_timeout);
        assert_eq!(config.report.webhook_url, "https://collector.example.com/hook");
        assert_eq!(config.report.username.as_deref(), Some("svc"));
        assert!(config.report.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.auth.port_range_start, 8080);
        assert_eq!(config.auth.port_range_end, 8089);
        assert_eq!(config.report.webhook_url, DEFAULT_WEBHOOK_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[auth]\ntimeout_seconds = 42\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.auth.timeout_seconds, 42);

        let missing = Config::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_merge_env() {
        let env: HashMap<&str, &str> = [
            ("BYOD_AUTH_METHOD", "email"),
            ("BYOD_AUTH_TIMEOUT", "60"),
            ("N8N_WEBHOOK_URL", "https://n8n.example.com/webhook/abc"),
            ("N8N_USERNAME", "user"),
            ("N8N_PASSWORD", "pass"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().merge_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.auth.method, AuthMethod::Email);
        assert_eq!(config.auth.timeout_seconds, 60);
        assert_eq!(config.report.webhook_url, "https://n8n.example.com/webhook/abc");
        assert_eq!(config.report.username.as_deref(), Some("user"));
        assert_eq!(config.report.password.as_deref(), Some("pass"));
    }

    #[test]
    fn test_byod_webhook_takes_precedence() {
        let env: HashMap<&str, &str> = [
            ("BYOD_WEBHOOK_URL", "https://primary.example.com"),
            ("N8N_WEBHOOK_URL", "https://legacy.example.com"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().merge_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.report.webhook_url, "https://primary.example.com");
    }

    #[test]
    fn test_validate_rejects_inverted_port_range() {
        let config = Config::builder().port_range(8090, 8080).build();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config::builder().auth_timeout_seconds(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_method_parse() {
        assert_eq!("Google".parse::<AuthMethod>().unwrap(), AuthMethod::Google);
        assert_eq!("email".parse::<AuthMethod>().unwrap(), AuthMethod::Email);
        assert!("saml".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .auth_method(AuthMethod::Email)
            .webhook_url("https://test.com")
            .basic_auth("u", "p")
            .reporting(false)
            .log_level("warn")
            .build();

        assert_eq!(config.auth.method, AuthMethod::Email);
        assert_eq!(config.report.webhook_url, "https://test.com");
        assert_eq!(config.report.password.as_deref(), Some("p"));
        assert!(!config.report.enabled);
        assert_eq!(config.logging.level, "warn");
    }
}
