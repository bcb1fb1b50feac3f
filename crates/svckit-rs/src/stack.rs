//! Service stack builder

use std::fmt;
use svckit_core::problem::error_endpoint;
use svckit_core::{
    from_fn, BoxFuture, BoxedNext, HandlerResult, LayerStack, MiddlewareLayer, ProblemLayer,
    Request, Response,
};
use svckit_extras::config::{load_dotenv, ConfigError, LoggingSettings, ProblemSettings};
use svckit_extras::request_logging::{ExchangeFormatter, RequestLoggingConfig, RequestLoggingLayer};

/// Name and version reported in the startup banner
///
/// Usually created with [`app_info!`](crate::app_info) so the values come from
/// the calling crate's manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Minimum supported Rust version, empty when not declared
    pub rust_version: String,
}

impl ApplicationInfo {
    /// Create application info from explicit values
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        rust_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rust_version: rust_version.into(),
        }
    }
}

impl fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rust_version = if self.rust_version.is_empty() {
            "unknown"
        } else {
            &self.rust_version
        };
        write!(
            f,
            "Application {} [version={}, rust-version={}]",
            self.name, self.version, rust_version
        )
    }
}

/// Builder that assembles the middleware around application handlers
///
/// Layers run in this order, outermost first:
///
/// 1. request logging, when configured
/// 2. problem translation, when enabled
/// 3. layers added with [`ServiceStack::layer`], in insertion order
///
/// Logging sits outside problem translation so the logged response is the
/// problem document the client receives.
///
/// # Example
///
/// ```rust,ignore
/// use svckit_rs::prelude::*;
///
/// let service = ServiceStack::from_env()?
///     .application(app_info!())
///     .build();
///
/// service.handle(&mut req, &mut res, handler).await?;
/// ```
pub struct ServiceStack {
    application: Option<ApplicationInfo>,
    logging: Option<RequestLoggingLayer>,
    problem: bool,
    layers: LayerStack,
}

impl ServiceStack {
    /// Create a stack with problem translation and no logging
    pub fn new() -> Self {
        Self {
            application: None,
            logging: None,
            problem: true,
            layers: LayerStack::new(),
        }
    }

    /// Create a stack from settings
    ///
    /// Logging is installed only when `logging.enabled` is set. Problem
    /// translation follows `problem.enabled`.
    pub fn from_settings(
        logging: &LoggingSettings,
        problem: &ProblemSettings,
    ) -> Result<Self, ConfigError> {
        let mut stack = Self::new().problem_translation(problem.enabled);
        if logging.enabled {
            stack = stack.logging(RequestLoggingConfig::from_settings(logging)?);
        }
        Ok(stack)
    }

    /// Create a stack from `SVCKIT_*` environment variables
    ///
    /// A `.env` file in the working directory is loaded first.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_settings(&LoggingSettings::from_env()?, &ProblemSettings::from_env()?)
    }

    /// Set the application reported in the startup banner
    pub fn application(mut self, info: ApplicationInfo) -> Self {
        self.application = Some(info);
        self
    }

    /// Install request logging with the text formatter
    pub fn logging(mut self, config: RequestLoggingConfig) -> Self {
        self.logging = Some(RequestLoggingLayer::new(config));
        self
    }

    /// Replace the formatter of the installed logging layer
    ///
    /// Does nothing when logging is not installed.
    pub fn log_format<F>(mut self, formatter: F) -> Self
    where
        F: ExchangeFormatter + 'static,
    {
        self.logging = self.logging.map(|layer| layer.with_formatter(formatter));
        self
    }

    /// Enable or disable problem translation
    pub fn problem_translation(mut self, enabled: bool) -> Self {
        self.problem = enabled;
        self
    }

    /// Add a middleware layer inside logging and problem translation
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: MiddlewareLayer,
    {
        self.layers.push(Box::new(layer));
        self
    }

    /// Assemble the layers and log the startup banner
    pub fn build(self) -> Service {
        let mut layers = self.layers;
        if self.problem {
            layers.prepend(Box::new(ProblemLayer::new()));
        }
        let logging = self.logging.is_some();
        if let Some(layer) = self.logging {
            layers.prepend(Box::new(layer));
        }

        tracing::debug!(
            target: "svckit::stack",
            logging,
            problem_translation = self.problem,
            layers = layers.len(),
            "Service stack assembled"
        );
        if let Some(info) = &self.application {
            tracing::info!(target: "svckit", "{} started.", info);
        }

        Service {
            layers,
            problem: self.problem,
        }
    }
}

impl Default for ServiceStack {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled middleware, ready to serve requests
#[derive(Clone)]
pub struct Service {
    layers: LayerStack,
    problem: bool,
}

impl Service {
    /// Run a request through the middleware and the handler
    pub fn handle<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
        handler: BoxedNext,
    ) -> BoxFuture<'a, HandlerResult> {
        self.layers.execute(req, res, handler)
    }

    /// Run an error re-dispatch through the middleware and the error endpoint
    ///
    /// With problem translation disabled the error endpoint is off as well:
    /// the response is left untouched for the host to render.
    pub fn handle_error<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, HandlerResult> {
        let handler = if self.problem {
            error_endpoint()
        } else {
            from_fn(|_req, _res| Box::pin(async { Ok(()) }))
        };
        self.layers.execute(req, res, handler)
    }

    /// Number of installed layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
