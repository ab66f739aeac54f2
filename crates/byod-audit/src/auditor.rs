//! Check auditor - runs the security controls against the local system

use crate::checks::{byod_checks, CheckResult, CheckType, ConfigCheck, Probe, Source, Verdict};
use byod_core::Platform;
use regex::Regex;
use serde::Serialize;
use std::process::Command;
use tracing::{debug, info, warn};

/// Runs security checks against the local system
pub struct ConfigAuditor {
    /// Checks to run
    checks: Vec<ConfigCheck>,
    /// Results of the last run
    results: Vec<CheckResult>,
    /// Platform the checks were chosen for
    platform: Platform,
}

/// Result of a full audit run
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    /// All check results, in check order
    pub results: Vec<CheckResult>,
    /// Summary statistics
    pub summary: AuditSummary,
}

impl AuditResult {
    /// Every control passed
    pub fn is_compliant(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn get(&self, check_id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check_id == check_id)
    }
}

/// Summary of audit results
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    /// Total checks run
    pub total_checks: usize,
    /// Checks that passed
    pub passed: usize,
    /// Checks that failed
    pub failed: usize,
}

/// What a single probe found
#[derive(Debug, PartialEq, Eq)]
enum ProbeOutcome {
    Concluded(Verdict),
    Inconclusive,
}

impl ConfigAuditor {
    /// Create a new auditor with the controls for the current platform
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self {
            checks: byod_checks(platform),
            results: Vec::new(),
            platform,
        }
    }

    /// Create auditor with custom checks
    pub fn with_checks(checks: Vec<ConfigCheck>) -> Self {
        Self {
            checks,
            results: Vec::new(),
            platform: Platform::current(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Run all checks
    pub fn run_audit(&mut self) -> AuditResult {
        info!("Starting security checks on {}", self.platform);

        self.results.clear();
        let mut summary = AuditSummary::default();

        for check in &self.checks {
            summary.total_checks += 1;

            let result = self.execute_check(check);
            if result.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }

            self.results.push(result);
        }

        info!(
            "Checks complete: {} passed, {} failed",
            summary.passed, summary.failed
        );

        AuditResult {
            results: self.results.clone(),
            summary,
        }
    }

    /// Execute a single check
    fn execute_check(&self, check: &ConfigCheck) -> CheckResult {
        debug!("Executing check: {} - {}", check.id, check.name);

        for (index, probe) in check.probes.iter().enumerate() {
            match run_probe(probe) {
                ProbeOutcome::Concluded(verdict) => {
                    debug!(check = %check.id, probe = index, passed = verdict.passed, "Probe concluded");
                    return CheckResult::from_verdict(check, verdict);
                }
                ProbeOutcome::Inconclusive => {
                    debug!(check = %check.id, probe = index, "Probe inconclusive");
                }
            }
        }

        CheckResult::from_verdict(check, check.fallback.clone())
    }

    /// Get all failed checks from the last run
    pub fn get_failures(&self) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

impl Default for ConfigAuditor {
    fn default() -> Self {
        Self::new()
    }
}

fn run_probe(probe: &Probe) -> ProbeOutcome {
    let Some(content) = read_source(&probe.source) else {
        return match &probe.if_unavailable {
            Some(verdict) => ProbeOutcome::Concluded(verdict.clone()),
            None => ProbeOutcome::Inconclusive,
        };
    };

    evaluate(probe, &content)
}

/// stdout of a successful command, or the file content
fn read_source(source: &Source) -> Option<String> {
    match source {
        Source::Command { command, args } => match Command::new(command).args(args).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => {
                debug!(command = %command, code = ?output.status.code(), "Command exited unsuccessfully");
                None
            }
            Err(e) => {
                debug!(command = %command, "Failed to run command: {}", e);
                None
            }
        },
        Source::File { path } => {
            let path = expand_home(path)?;
            std::fs::read_to_string(&path).ok()
        }
    }
}

fn expand_home(path: &str) -> Option<std::path::PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(std::path::PathBuf::from(path)),
    }
}

fn evaluate(probe: &Probe, content: &str) -> ProbeOutcome {
    match &probe.check_type {
        CheckType::Present { passed } => ProbeOutcome::Concluded(Verdict {
            passed: *passed,
            message: if *passed {
                probe.pass_message.clone()
            } else {
                probe.fail_message.clone()
            },
        }),

        CheckType::Pattern {
            pass,
            fail,
            otherwise,
        } => {
            if let Some(fail) = fail {
                if matches(fail, content) {
                    return ProbeOutcome::Concluded(Verdict::fail(&probe.fail_message));
                }
            }
            if let Some(pass) = pass {
                if matches(pass, content) {
                    return ProbeOutcome::Concluded(Verdict::pass(&probe.pass_message));
                }
            }
            match otherwise {
                Some(true) => ProbeOutcome::Concluded(Verdict::pass(&probe.pass_message)),
                Some(false) => ProbeOutcome::Concluded(Verdict::fail(&probe.fail_message)),
                None => ProbeOutcome::Inconclusive,
            }
        }

        CheckType::Within {
            pattern,
            radix,
            min,
            max,
            scale,
        } => {
            let value = Regex::new(pattern)
                .map_err(|e| warn!("Invalid check pattern {:?}: {}", pattern, e))
                .ok()
                .and_then(|re| re.captures(content))
                .and_then(|caps| caps.get(1))
                .and_then(|m| u64::from_str_radix(m.as_str(), *radix).ok());

            let Some(value) = value else {
                return ProbeOutcome::Inconclusive;
            };

            let minutes = (value / (*scale).max(1)).to_string();
            if (*min..=*max).contains(&value) {
                ProbeOutcome::Concluded(Verdict::pass(
                    probe.pass_message.replace("{minutes}", &minutes),
                ))
            } else {
                ProbeOutcome::Concluded(Verdict::fail(
                    probe.fail_message.replace("{minutes}", &minutes),
                ))
            }
        }
    }
}

fn matches(pattern: &str, content: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(content),
        Err(e) => {
            warn!("Invalid check pattern {:?}: {}", pattern, e);
            false
        }
    }
}
