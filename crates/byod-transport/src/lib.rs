//! BYOD Transport - Delivering compliance reports to the collector
//!
//! This crate provides:
//! - Report types: the full [`ComplianceReport`] and the flattened body the
//!   collector webhook expects
//! - [`WebhookReporter`]: HTTP delivery with basic or bearer authentication
//!
//! Delivery failures are returned as [`ReportError`]; callers log them
//! without changing the outcome of the checks.

pub mod types;
pub mod webhook;

pub use types::{CheckOutcome, ComplianceReport, FlatReport, RemediationItem, ReportUser};
pub use webhook::{ReportError, Reporter, WebhookAuth, WebhookConfig, WebhookReporter};
