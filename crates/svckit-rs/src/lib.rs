//! # svckit
//!
//! Request/response logging and RFC 7807 problem responses for HTTP services.
//!
//! svckit sits between an HTTP host and the application handlers. The host
//! parses requests into [`Request`] values and delivers [`Response`] output;
//! svckit adds:
//!
//! - **Request logging**: every exchange logged as a request and a response
//!   message sharing one id, bodies included, without the handler noticing
//! - **Problem responses**: every error a handler returns becomes an
//!   `application/problem+json` body with a matching status
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use svckit_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     init_tracing();
//!
//!     // SVCKIT_LOGGING_ENABLED=true
//!     let service = ServiceStack::from_env()?.application(app_info!()).build();
//!
//!     let handler = from_fn(|req, res| Box::pin(async move {
//!         let body = req.read_body().await?;
//!         res.write_body("application/json", &body)?;
//!         Ok(())
//!     }));
//!
//!     // for each request parsed by the host:
//!     service.handle(&mut req, &mut res, handler.clone()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `SVCKIT_LOGGING_ENABLED` | `false` |
//! | `SVCKIT_LOGGING_INCLUDE_HEADERS` | `true` |
//! | `SVCKIT_LOGGING_INCLUDE_CLIENT_INFO` | `false` |
//! | `SVCKIT_LOGGING_INCLUDE_QUERY_STRING` | `true` |
//! | `SVCKIT_LOGGING_INCLUDE_PAYLOAD` | `true` |
//! | `SVCKIT_LOGGING_MAX_PAYLOAD_SIZE` | `2048` |
//! | `SVCKIT_LOGGING_FILTER_URI` | `true` |
//! | `SVCKIT_LOGGING_INCLUDE_URI_PATTERNS` | empty |
//! | `SVCKIT_LOGGING_EXCLUDE_URI_PATTERNS` | empty |
//! | `SVCKIT_PROBLEM_ENABLED` | `true` |

mod stack;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export core functionality
pub use svckit_core::*;

// Re-export extras
pub use svckit_extras::config;
pub use svckit_extras::request_logging;
pub use svckit_extras::{
    load_dotenv, load_dotenv_from, Config, ConfigError, ExchangeFormatter, JsonFormatter,
    LoggingSettings, ProblemSettings, RequestLoggingConfig, RequestLoggingLayer, TextFormatter,
};

pub use stack::{ApplicationInfo, Service, ServiceStack};

/// Install a `fmt` subscriber filtered by `RUST_LOG`
///
/// Falls back to `info` when `RUST_LOG` is unset or invalid. Does nothing if
/// a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// [`ApplicationInfo`] of the calling crate, read from its manifest
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::ApplicationInfo::new(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION"),
        )
    };
}

/// Prelude module - import everything you need with `use svckit_rs::prelude::*`
pub mod prelude {
    pub use crate::{app_info, init_tracing, ApplicationInfo, Service, ServiceStack};

    // Core types
    pub use svckit_core::{
        from_fn,
        // Error handling
        AppError,
        BoxedNext,
        ClientInfo,
        DispatchKind,
        ExposePolicy,
        HandlerResult,
        LayerStack,
        MiddlewareLayer,
        Problem,
        ProblemLayer,
        Request,
        Response,
        Result,
        ServiceError,
        ValidationError,
    };

    // Logging and configuration
    pub use svckit_extras::{
        load_dotenv, LoggingSettings, ProblemSettings, RequestLoggingConfig, RequestLoggingLayer,
    };

    // Re-export validation - use validator derive macro directly
    pub use validator::Validate;

    // Re-export commonly used external types
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
