//! BYOD Common - Shared utilities: configuration and logging
//!
//! This crate provides common functionality used across all BYOD checker crates.

pub mod config;
pub mod logging;

pub use config::{AuthConfig, AuthMethod, Config, ConfigBuilder, LoggingConfig, ReportConfig};
pub use logging::{init_logging_with_config, LogConfig, LogFormat};
