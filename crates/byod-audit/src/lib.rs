//! BYOD Audit - Device security controls (agent mode)
//!
//! This crate provides the compliance checks run once a user is signed in:
//! - OS firewall enabled
//! - Full disk encryption (FileVault, BitLocker, LUKS)
//! - Screen lock after 10 minutes idle or less
//! - No active guest account
//!
//! Each control is described as data (which command or file to look at and
//! how to read it) in [`checks`]. The [`ConfigAuditor`] executes them.
//!
//! # Example
//!
//! ```no_run
//! use byod_audit::ConfigAuditor;
//!
//! let mut auditor = ConfigAuditor::new();
//! let result = auditor.run_audit();
//!
//! for check in &result.results {
//!     println!("{}: {}", check.check_name, check.message);
//! }
//! println!("Compliant: {}", result.is_compliant());
//! ```

pub mod auditor;
pub mod checks;
pub mod collectors;

pub use auditor::{AuditResult, AuditSummary, ConfigAuditor};
pub use checks::{byod_checks, CheckResult, CheckType, ConfigCheck, Probe, Source, Verdict};
pub use collectors::{DeviceInfo, SystemCollector, SystemInfo};
