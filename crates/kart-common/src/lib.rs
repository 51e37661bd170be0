//! Kart Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Kart workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`KartError`] and the [`Result`] alias used by configuration code
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`] wrapping `tracing-subscriber`
//!
//! # Example
//!
//! ```no_run
//! use kart_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("coupon loader starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{KartError, Result};
