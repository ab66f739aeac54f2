//! Terminal rendering of device info and check results

use std::fmt::Write;

use byod_audit::{AuditResult, DeviceInfo, SystemInfo};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Text renderer; colour is only used when stdout is a terminal
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    pub fn banner(&self) -> String {
        format!(
            "saas.group BYOD Security Checker v{}\n{}\n",
            env!("CARGO_PKG_VERSION"),
            "=".repeat(50)
        )
    }

    pub fn device_info(&self, device: &DeviceInfo, system: &SystemInfo) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Device Information:");
        let _ = writeln!(out, "  Brand:        {}", device.brand);
        let _ = writeln!(out, "  Model:        {}", device.model);
        let _ = writeln!(out, "  Serial:       {}", device.serial);
        let _ = writeln!(out, "  RAM:          {}", device.ram);
        let _ = writeln!(out, "  Storage:      {}", device.storage);
        let _ = writeln!(out);
        let _ = writeln!(out, "System:");
        let _ = writeln!(out, "  Platform:     {}", system.platform);
        let _ = writeln!(out, "  Version:      {}", system.version);
        let _ = writeln!(out, "  Machine:      {}", system.machine);
        let _ = writeln!(out, "  Hostname:     {}", system.hostname);
        out
    }

    pub fn results(&self, system: &SystemInfo, result: &AuditResult) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\nSecurity Compliance Report for {} {}",
            system.platform, system.version
        );
        let _ = writeln!(out, "{}", "=".repeat(60));

        for r in &result.results {
            let status = if r.passed {
                self.paint(GREEN, "PASS")
            } else {
                self.paint(RED, "FAIL")
            };
            let _ = writeln!(out, "[{}] {:<20} {}", status, r.check_name, r.description);
            let _ = writeln!(out, "       {:<20} {}", "", r.message);
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{}", "=".repeat(60));
        if result.is_compliant() {
            let _ = writeln!(out, "{}", self.paint(GREEN, "ALL CHECKS PASSED - Device is compliant"));
        } else {
            let _ = writeln!(out, "{}", self.paint(RED, "SOME CHECKS FAILED - Device is not compliant"));

            let fixes: Vec<_> = result.failures().filter(|r| !r.remediation.is_empty()).collect();
            if !fixes.is_empty() {
                let _ = writeln!(out, "\n{}", "=".repeat(60));
                let _ = writeln!(out, "{}", self.paint(YELLOW, "REMEDIATION STEPS"));
                let _ = writeln!(out, "{}", "=".repeat(60));
                for r in fixes {
                    let _ = writeln!(out, "\n{}", self.paint(RED, &r.check_name));
                    let _ = writeln!(out, "  How to fix: {}", r.remediation);
                }
            }
        }

        let _ = writeln!(
            out,
            "\nSummary: {}/{} passed",
            result.summary.passed, result.summary.total_checks
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byod_audit::{AuditSummary, CheckResult};

    fn check(id: &str, name: &str, passed: bool, remediation: &str) -> CheckResult {
        CheckResult {
            check_id: id.into(),
            check_name: name.into(),
            description: format!("{} enabled", name),
            passed,
            message: format!("{} message", name),
            remediation: remediation.into(),
        }
    }

    fn system() -> SystemInfo {
        SystemInfo {
            platform: "Linux".into(),
            version: "6.8.0".into(),
            machine: "x86_64".into(),
            hostname: "devbox".into(),
        }
    }

    #[test]
    fn test_compliant_run() {
        let audit = AuditResult {
            results: vec![check("os_firewall", "OS Firewall", true, "")],
            summary: AuditSummary {
                total_checks: 1,
                passed: 1,
                failed: 0,
            },
        };

        let text = Renderer::new(false).results(&system(), &audit);
        assert!(text.contains("Security Compliance Report for Linux 6.8.0"));
        assert!(text.contains("[PASS] OS Firewall"));
        assert!(text.contains("ALL CHECKS PASSED"));
        assert!(!text.contains("REMEDIATION STEPS"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_failures_list_remediation() {
        let audit = AuditResult {
            results: vec![
                check("os_firewall", "OS Firewall", true, ""),
                check("disk_encryption", "Disk Encryption", false, "Enable FileVault"),
            ],
            summary: AuditSummary {
                total_checks: 2,
                passed: 1,
                failed: 1,
            },
        };

        let text = Renderer::new(false).results(&system(), &audit);
        assert!(text.contains("[FAIL] Disk Encryption"));
        assert!(text.contains("SOME CHECKS FAILED"));
        assert!(text.contains("How to fix: Enable FileVault"));
        assert!(text.contains("Summary: 1/2 passed"));
    }

    #[test]
    fn test_colour_only_when_enabled() {
        let audit = AuditResult {
            results: vec![check("autolock", "Auto-lock", false, "")],
            summary: AuditSummary {
                total_checks: 1,
                passed: 0,
                failed: 1,
            },
        };

        let text = Renderer::new(true).results(&system(), &audit);
        assert!(text.contains("\x1b[31mFAIL\x1b[0m"));
    }

    #[test]
    fn test_device_info() {
        let text = Renderer::new(false).device_info(&DeviceInfo::default(), &system());
        assert!(text.contains("Brand:        Unknown"));
        assert!(text.contains("Hostname:     devbox"));
    }
}
