//! Configuration management with environment variable support.
//!
//! Settings are read from the process environment, optionally seeded from a
//! `.env` file. Each settings struct has its own prefix:
//!
//! | Struct | Prefix |
//! |---|---|
//! | [`LoggingSettings`] | `SVCKIT_LOGGING_` |
//! | [`ProblemSettings`] | `SVCKIT_PROBLEM_` |
//!
//! # Example
//!
//! ```ignore
//! use svckit_extras::config::{load_dotenv, LoggingSettings};
//!
//! // Load .env file at startup
//! load_dotenv();
//!
//! // SVCKIT_LOGGING_ENABLED=true
//! // SVCKIT_LOGGING_INCLUDE_URI_PATTERNS=/api/.*
//! let settings = LoggingSettings::from_env()?;
//! assert!(settings.enabled);
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed.
    #[error("Configuration error: {0}")]
    EnvyError(#[from] envy::Error),

    /// A URI pattern is not a valid regular expression.
    #[cfg(feature = "request-logging")]
    #[error(transparent)]
    InvalidUriPattern(#[from] crate::request_logging::InvalidUriPattern),
}

/// Configuration extractor that deserializes environment variables.
///
/// Uses the `envy` crate to deserialize environment variables into
/// a typed configuration struct. Field names are converted to
/// SCREAMING_SNAKE_CASE for environment variable lookup.
///
/// # Example
///
/// ```ignore
/// use svckit_extras::config::Config;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct DbConfig {
///     url: String,   // Reads from DB_URL
///     pool: u32,     // Reads from DB_POOL
/// }
///
/// let config = Config::<DbConfig>::from_env_prefixed("DB")?;
/// ```
#[derive(Debug, Clone)]
pub struct Config<T>(pub T);

impl<T: DeserializeOwned> Config<T> {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::from_env::<T>().map(Config).map_err(ConfigError::from)
    }

    /// Load configuration with a prefix.
    ///
    /// Only environment variables starting with the given prefix
    /// (followed by underscore) will be considered.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, ConfigError> {
        envy::prefixed(format!("{}_", prefix))
            .from_env::<T>()
            .map(Config)
            .map_err(ConfigError::from)
    }

    /// Get the inner configuration value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Load environment variables from a `.env` file.
///
/// Existing environment variables take precedence over `.env` values. A
/// missing file is not an error.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific file path.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}

/// Environment prefix of [`LoggingSettings`]
pub const LOGGING_PREFIX: &str = "SVCKIT_LOGGING";

/// Environment prefix of [`ProblemSettings`]
pub const PROBLEM_PREFIX: &str = "SVCKIT_PROBLEM";

/// Settings of the request/response logging middleware.
///
/// Every field can be set through `SVCKIT_LOGGING_<FIELD>`. Pattern lists are
/// comma separated regular expressions, matched against the whole request
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Whether the logging middleware is installed at all.
    pub enabled: bool,
    /// Log request and response headers.
    pub include_headers: bool,
    /// Log remote address, remote user and session id.
    pub include_client_info: bool,
    /// Append the query string to the logged URI.
    pub include_query_string: bool,
    /// Log request and response bodies.
    pub include_payload: bool,
    /// Maximum number of body bytes logged.
    pub max_payload_size: usize,
    /// Apply the include and exclude patterns.
    pub filter_uri: bool,
    /// Only paths matching one of these are logged. Empty means all.
    pub include_uri_patterns: Vec<String>,
    /// Paths matching one of these are never logged.
    pub exclude_uri_patterns: Vec<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            include_headers: true,
            include_client_info: false,
            include_query_string: true,
            include_payload: true,
            max_payload_size: 2048,
            filter_uri: true,
            include_uri_patterns: Vec::new(),
            exclude_uri_patterns: Vec::new(),
        }
    }
}

impl LoggingSettings {
    /// Read the settings from `SVCKIT_LOGGING_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::<Self>::from_env_prefixed(LOGGING_PREFIX).map(Config::into_inner)
    }
}

/// Settings of problem translation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProblemSettings {
    /// Whether errors are translated into problem responses.
    pub enabled: bool,
}

impl Default for ProblemSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ProblemSettings {
    /// Read the settings from `SVCKIT_PROBLEM_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::<Self>::from_env_prefixed(PROBLEM_PREFIX).map(Config::into_inner)
    }
}
