//! # svckit-extras
//!
//! Opt-in middleware and utilities for svckit.
//!
//! Everything here is behind a Cargo feature flag:
//!
//! - `request-logging` - Request/response logging middleware with replayable
//!   request bodies and captured response bodies
//! - `config` - Environment driven settings with `.env` file support
//! - `full` - All features enabled
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! svckit-extras = { version = "0.1", features = ["request-logging", "config"] }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Configuration management module
#[cfg(feature = "config")]
pub mod config;

// Request/Response logging middleware
#[cfg(feature = "request-logging")]
pub mod request_logging;

// Re-exports for convenience
#[cfg(feature = "config")]
pub use config::{
    load_dotenv, load_dotenv_from, Config, ConfigError, LoggingSettings, ProblemSettings,
};

#[cfg(feature = "request-logging")]
pub use request_logging::{
    ExchangeFormatter, JsonFormatter, RequestLoggingConfig, RequestLoggingLayer, TextFormatter,
};
