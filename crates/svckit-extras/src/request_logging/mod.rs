//! Request logging - Opt-in request/response logging middleware.
//!
//! Every exchange that passes the URI filter produces two log events on the
//! `svckit::request_logging` target at INFO level. Both carry the same
//! `log_id` field so the response can be matched to its request even when
//! exchanges interleave.
//!
//! # Features
//!
//! - **Replayable request body**: the body is buffered before logging, the
//!   handler still reads it in full
//! - **Response capture**: the response body is held back until it has been
//!   logged, then released to the client exactly once
//! - **URI filtering**: include and exclude regular expressions matched
//!   against the whole path
//! - **Formats**: multi-line text or one JSON object per message
//!
//! # Quick Start
//!
//! ```ignore
//! use svckit_core::LayerStack;
//! use svckit_extras::request_logging::{RequestLoggingConfig, RequestLoggingLayer};
//!
//! let config = RequestLoggingConfig::builder()
//!     .include_payload(true)
//!     .include_headers(true)
//!     .filter_uri(true)
//!     .include_pattern("/api/.*")
//!     .exclude_pattern("/api/health")
//!     .build()?;
//!
//! let mut stack = LayerStack::new();
//! stack.push(Box::new(RequestLoggingLayer::new(config)));
//! ```
//!
//! A logged exchange looks like:
//!
//! ```text
//! 3 > REQUEST POST /api/cars content-type=application/json
//! 3 > thread:[tokio-runtime-worker]
//! 3 > accept: application/json
//! 3 > content-type=application/json
//! {"plate":"AB-12"}
//! 3 < RESPONSE 201 (Created) [12 ms] POST /api/cars content-type=application/json
//! 3 < thread:[tokio-runtime-worker]
//! 3 < content-type=application/json
//! {"id":1,"plate":"AB-12"}
//! ```

mod config;
mod entry;
mod formats;
mod layer;

pub use config::{InvalidUriPattern, RequestLoggingConfig, RequestLoggingConfigBuilder, UriPattern};
pub use entry::{decode_payload, next_log_id, sorted_headers, LogEntry, ResponseEntry};
pub use formats::{format_duration, ExchangeFormatter, JsonFormatter, TextFormatter};
pub use layer::{RequestLoggingLayer, LOG_TARGET};
