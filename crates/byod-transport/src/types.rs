//! Report payload types

use std::collections::BTreeMap;

use byod_audit::checks::{AUTOLOCK, DISK_ENCRYPTION, GUEST_ACCOUNTS, OS_FIREWALL};
use byod_audit::{AuditResult, DeviceInfo, SystemInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who ran the checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportUser {
    pub email: String,
    pub domain: String,
    /// `google` or `email`
    pub auth_method: String,
    /// Identity came from an identity provider rather than typed in
    pub verified: bool,
}

/// Outcome of one control, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status: bool,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationItem {
    pub check: String,
    pub message: String,
    pub remediation: String,
}

/// Full compliance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub timestamp: DateTime<Utc>,
    pub user: ReportUser,
    pub device_info: DeviceInfo,
    pub system: SystemInfo,
    /// Keyed by check ID
    pub security_checks: BTreeMap<String, CheckOutcome>,
    pub compliance_status: bool,
    pub failed_checks: Vec<String>,
    pub remediation_needed: Vec<RemediationItem>,
}

impl ComplianceReport {
    pub fn new(user: ReportUser, device_info: DeviceInfo, system: SystemInfo, audit: &AuditResult) -> Self {
        let security_checks = audit
            .results
            .iter()
            .map(|r| {
                (
                    r.check_id.clone(),
                    CheckOutcome {
                        status: r.passed,
                        message: r.message.clone(),
                        remediation: r.remediation.clone(),
                    },
                )
            })
            .collect();

        let failed_checks = audit.failures().map(|r| r.check_id.clone()).collect();

        let remediation_needed = audit
            .failures()
            .filter(|r| !r.remediation.is_empty())
            .map(|r| RemediationItem {
                check: r.check_id.clone(),
                message: r.message.clone(),
                remediation: r.remediation.clone(),
            })
            .collect();

        Self {
            timestamp: Utc::now(),
            user,
            device_info,
            system,
            security_checks,
            compliance_status: audit.is_compliant(),
            failed_checks,
            remediation_needed,
        }
    }

    /// One-level JSON body for the collector webhook
    pub fn flatten(&self) -> FlatReport {
        let check = |id: &str| self.security_checks.get(id).cloned().unwrap_or(CheckOutcome {
            status: false,
            message: String::from("Check did not run"),
            remediation: String::new(),
        });
        let firewall = check(OS_FIREWALL);
        let encryption = check(DISK_ENCRYPTION);
        let autolock = check(AUTOLOCK);
        let guest = check(GUEST_ACCOUNTS);

        FlatReport {
            timestamp: self.timestamp.to_rfc3339(),
            user_email: self.user.email.clone(),
            user_domain: self.user.domain.clone(),
            auth_method: self.user.auth_method.clone(),
            identity_verified: self.user.verified,
            compliance_status: self.compliance_status,
            failed_checks_count: self.failed_checks.len(),
            failed_checks: self.failed_checks.join(","),

            device_brand: self.device_info.brand.clone(),
            device_model: self.device_info.model.clone(),
            device_serial: self.device_info.serial.clone(),
            device_ram: self.device_info.ram.clone(),
            device_storage: self.device_info.storage.clone(),

            system_platform: self.system.platform.clone(),
            system_version: self.system.version.clone(),
            system_machine: self.system.machine.clone(),
            system_hostname: self.system.hostname.clone(),

            firewall_status: firewall.status,
            firewall_message: firewall.message,
            firewall_remediation: firewall.remediation,

            encryption_status: encryption.status,
            encryption_message: encryption.message,
            encryption_remediation: encryption.remediation,

            autolock_status: autolock.status,
            autolock_message: autolock.message,
            autolock_remediation: autolock.remediation,

            guest_accounts_status: guest.status,
            guest_accounts_message: guest.message,
            guest_accounts_remediation: guest.remediation,

            remediation_needed: if self.remediation_needed.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&self.remediation_needed).unwrap_or_default()
            },
        }
    }
}

/// Flattened report body posted to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatReport {
    pub timestamp: String,
    pub user_email: String,
    pub user_domain: String,
    pub auth_method: String,
    pub identity_verified: bool,
    pub compliance_status: bool,
    pub failed_checks_count: usize,
    /// Comma-separated check IDs
    pub failed_checks: String,

    pub device_brand: String,
    pub device_model: String,
    pub device_serial: String,
    pub device_ram: String,
    pub device_storage: String,

    pub system_platform: String,
    pub system_version: String,
    pub system_machine: String,
    pub system_hostname: String,

    pub firewall_status: bool,
    pub firewall_message: String,
    pub firewall_remediation: String,

    pub encryption_status: bool,
    pub encryption_message: String,
    pub encryption_remediation: String,

    pub autolock_status: bool,
    pub autolock_message: String,
    pub autolock_remediation: String,

    pub guest_accounts_status: bool,
    pub guest_accounts_message: String,
    pub guest_accounts_remediation: String,

    /// JSON-encoded list of [`RemediationItem`], empty when compliant
    pub remediation_needed: String,
}
