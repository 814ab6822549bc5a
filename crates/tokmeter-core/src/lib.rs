//! # tokmeter-core
//!
//! Core errors and utilities shared by the tokmeter crates.
//!
//! This crate provides:
//! - [`CoreError`] - Errors raised by ambient setup (logging, configuration files)
//! - [`logging`] - Tracing setup and the `log_cost_event!` macro
//!
//! ## Example
//!
//! ```no_run
//! use tokmeter_core::{CoreError, logging};
//!
//! fn main() -> tokmeter_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config_path = std::path::Path::new("meter.yaml");
//!     if !config_path.exists() {
//!         return Err(CoreError::config_not_found(config_path));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CoreError, Result};
pub use logging::{LogGuard, init_logging, init_test_logging};
