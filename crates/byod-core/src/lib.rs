//! BYOD Core - Foundation types and error handling
//!
//! This crate provides the abstractions shared by every BYOD checker crate:
//! - `Error` / `Result`: the error taxonomy surfaced to the CLI
//! - `Platform`: the operating system the checker is running on

pub mod error;
pub mod platform;

pub use error::{Error, Result};
pub use platform::Platform;
