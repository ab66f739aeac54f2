//! BYOD Security Checker - Device compliance CLI
//!
//! Entry point for the `byod-check` binary. A run:
//! - Authenticates the user (Google Sign-In, or email fallback)
//! - Runs the firewall, disk encryption, auto-lock and guest account checks
//! - Prints the results and sends them to the collector webhook

mod output;
mod prompts;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use byod_audit::{AuditResult, ConfigAuditor, DeviceInfo, SystemCollector, SystemInfo};
use byod_auth::{AuthOrchestrator, Identity, SystemBrowser};
use byod_common::{AuthMethod, Config, LogConfig};
use byod_transport::{ComplianceReport, ReportUser, Reporter, WebhookConfig, WebhookReporter};
use clap::{Parser, ValueEnum};
use tracing::{debug, error, info, warn};

use crate::output::Renderer;
use crate::prompts::TerminalPrompts;

/// Authentication failed or was refused
const EXIT_AUTH_FAILURE: u8 = 1;
/// Configuration or environment problem
const EXIT_ENVIRONMENT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// saas.group BYOD Security Checker
#[derive(Parser, Debug)]
#[command(name = "byod-check")]
#[command(version)]
#[command(about = "Checks that a personal device meets the BYOD security baseline", long_about = None)]
struct Args {
    /// Authentication method (google, email)
    #[arg(long)]
    auth_method: Option<String>,

    /// Do not send results to the collector
    #[arg(long)]
    no_report: bool,

    /// Collector webhook URL
    #[arg(long)]
    webhook_url: Option<String>,

    /// Webhook basic auth username
    #[arg(long)]
    webhook_username: Option<String>,

    /// Webhook basic auth password
    #[arg(long)]
    webhook_password: Option<String>,

    /// Webhook bearer token
    #[arg(long)]
    api_key: Option<String>,

    /// Seconds to wait for browser sign-in
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print device information and exit
    #[arg(long)]
    system_info: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ENVIRONMENT)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;

    byod_common::init_logging_with_config(LogConfig::from_settings(&config.logging));

    info!("BYOD Security Checker v{}", env!("CARGO_PKG_VERSION"));
    info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);

    let renderer = Renderer::new(std::io::stdout().is_terminal());

    if args.system_info {
        return print_system_info(&args, &renderer);
    }

    if args.format == OutputFormat::Text {
        println!("{}", renderer.banner());
    }

    let orchestrator = AuthOrchestrator::new(
        config.auth.clone(),
        Box::new(SystemBrowser),
        Box::new(TerminalPrompts::new()),
    );
    let attempt = orchestrator.run().await;
    let method = attempt.method();
    debug!(state = %attempt.state(), method = %method, "Authentication finished");

    let identity = match attempt.into_result() {
        Ok(identity) => identity,
        Err(e) => {
            error!(code = e.code(), "Authentication failed: {}", e);
            eprintln!("Authentication failed: {}", e);
            let code = if e.is_auth_failure() {
                EXIT_AUTH_FAILURE
            } else {
                EXIT_ENVIRONMENT
            };
            return Ok(ExitCode::from(code));
        }
    };
    eprintln!("Authenticated as {}", identity);

    let (audit, device, system) = tokio::task::spawn_blocking(run_checks)
        .await
        .context("compliance checks did not complete")?;

    let report = ComplianceReport::new(report_user(&identity, method), device, system, &audit);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("{}", renderer.device_info(&report.device_info, &report.system));
            print!("{}", renderer.results(&report.system, &audit));
        }
    }

    if config.report.enabled {
        deliver(&config, &report).await;
    } else {
        info!("Reporting disabled; results not sent");
    }

    Ok(ExitCode::SUCCESS)
}

/// File (explicit or default location), then environment, then flags
fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(&path)?,
            None => Config::default(),
        },
    };

    let mut config = config.merge_env();
    apply_overrides(&mut config, args)?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(method) = &args.auth_method {
        config.auth.method = method.parse::<AuthMethod>()?;
    }
    if let Some(seconds) = args.timeout {
        config.auth.timeout_seconds = seconds;
    }
    if args.no_report {
        config.report.enabled = false;
    }
    if let Some(url) = &args.webhook_url {
        config.report.webhook_url = url.clone();
    }
    if let Some(username) = &args.webhook_username {
        config.report.username = Some(username.clone());
    }
    if let Some(password) = &args.webhook_password {
        config.report.password = Some(password.clone());
    }
    if let Some(key) = &args.api_key {
        config.report.api_key = Some(key.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(())
}

fn run_checks() -> (AuditResult, DeviceInfo, SystemInfo) {
    info!("Running BYOD security compliance checks...");
    let mut auditor = ConfigAuditor::new();
    let audit = auditor.run_audit();
    (audit, SystemCollector::device_info(), SystemCollector::system_info())
}

fn report_user(identity: &Identity, method: AuthMethod) -> ReportUser {
    ReportUser {
        email: identity.email().to_string(),
        domain: identity.domain().to_string(),
        auth_method: method.as_str().to_string(),
        verified: identity.verified(),
    }
}

/// Send the report; failures are reported but never change the exit status
async fn deliver(config: &Config, report: &ComplianceReport) {
    let reporter = match WebhookReporter::new(WebhookConfig::from_settings(&config.report)) {
        Ok(reporter) => reporter,
        Err(e) => {
            warn!("Cannot send results: {}", e);
            eprintln!("Warning: results were not sent: {}", e);
            return;
        }
    };

    match reporter.deliver(report).await {
        Ok(()) => eprintln!("Results sent to the security team"),
        Err(e) => {
            let err = byod_core::Error::from(e);
            warn!(code = err.code(), "{}", err);
            eprintln!("Warning: {}", err);
        }
    }
}

fn print_system_info(args: &Args, renderer: &Renderer) -> Result<ExitCode> {
    let device = SystemCollector::device_info();
    let system = SystemCollector::system_info();

    match args.format {
        OutputFormat::Json => {
            let info = serde_json::json!({
                "device_info": device,
                "system": system,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => print!("{}", renderer.device_info(&device, &system)),
    }

    Ok(ExitCode::SUCCESS)
}
