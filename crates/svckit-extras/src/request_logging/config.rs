//! Request logging configuration types

use regex::Regex;
use std::fmt;

/// Error returned for a URI pattern that is not a valid regular expression
#[derive(Debug, thiserror::Error)]
#[error("invalid URI pattern '{pattern}': {source}")]
pub struct InvalidUriPattern {
    /// The pattern as written
    pub pattern: String,
    /// Why it did not compile
    #[source]
    pub source: regex::Error,
}

/// A regular expression matched against the whole request path
#[derive(Clone)]
pub struct UriPattern {
    source: String,
    regex: Regex,
}

impl UriPattern {
    /// Compile a pattern. `/api/.*` matches `/api/cars` but not `/v1/api/cars`.
    pub fn new(pattern: &str) -> Result<Self, InvalidUriPattern> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| InvalidUriPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check whether the whole URI matches
    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UriPattern").field(&self.source).finish()
    }
}

/// Request logging configuration
///
/// Immutable once built. The defaults log only the request and response
/// lines for every URI.
#[derive(Clone, Debug)]
pub struct RequestLoggingConfig {
    /// Log request and response bodies
    pub include_payload: bool,
    /// Log headers other than `Content-Type`
    pub include_headers: bool,
    /// Log remote address, remote user and session id
    pub include_client_info: bool,
    /// Append the query string to the logged URI
    pub include_query_string: bool,
    /// Maximum number of body bytes logged
    pub max_payload_size: usize,
    /// Apply the include and exclude patterns
    pub filter_uri: bool,
    include_patterns: Vec<UriPattern>,
    exclude_patterns: Vec<UriPattern>,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            include_payload: false,
            include_headers: false,
            include_client_info: false,
            include_query_string: false,
            max_payload_size: 4096,
            filter_uri: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl RequestLoggingConfig {
    /// Create a new builder for RequestLoggingConfig
    pub fn builder() -> RequestLoggingConfigBuilder {
        RequestLoggingConfigBuilder::default()
    }

    /// Build the configuration described by environment settings
    #[cfg(feature = "config")]
    pub fn from_settings(
        settings: &crate::config::LoggingSettings,
    ) -> Result<Self, crate::config::ConfigError> {
        let mut builder = Self::builder()
            .include_payload(settings.include_payload)
            .include_headers(settings.include_headers)
            .include_client_info(settings.include_client_info)
            .include_query_string(settings.include_query_string)
            .max_payload_size(settings.max_payload_size)
            .filter_uri(settings.filter_uri);

        for pattern in non_blank(&settings.include_uri_patterns) {
            builder = builder.include_pattern(pattern);
        }
        for pattern in non_blank(&settings.exclude_uri_patterns) {
            builder = builder.exclude_pattern(pattern);
        }

        Ok(builder.build()?)
    }

    /// Patterns a URI must match to be logged
    pub fn include_patterns(&self) -> &[UriPattern] {
        &self.include_patterns
    }

    /// Patterns that keep a URI from being logged
    pub fn exclude_patterns(&self) -> &[UriPattern] {
        &self.exclude_patterns
    }

    /// Decide whether requests for this URI are logged
    ///
    /// Without URI filtering everything is logged. Otherwise the URI must match
    /// an include pattern (or there are none) and no exclude pattern.
    pub fn should_log(&self, uri: &str) -> bool {
        if !self.filter_uri {
            return true;
        }

        let included = self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| p.matches(uri));
        let excluded = self.exclude_patterns.iter().any(|p| p.matches(uri));

        included && !excluded
    }
}

#[cfg(feature = "config")]
fn non_blank(patterns: &[String]) -> impl Iterator<Item = &str> {
    patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty())
}

/// Builder for RequestLoggingConfig
#[derive(Default)]
pub struct RequestLoggingConfigBuilder {
    config: RequestLoggingConfig,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl RequestLoggingConfigBuilder {
    /// Set whether to log bodies
    pub fn include_payload(mut self, include: bool) -> Self {
        self.config.include_payload = include;
        self
    }

    /// Set whether to log headers
    pub fn include_headers(mut self, include: bool) -> Self {
        self.config.include_headers = include;
        self
    }

    /// Set whether to log client information
    pub fn include_client_info(mut self, include: bool) -> Self {
        self.config.include_client_info = include;
        self
    }

    /// Set whether to log the query string
    pub fn include_query_string(mut self, include: bool) -> Self {
        self.config.include_query_string = include;
        self
    }

    /// Set the maximum number of body bytes logged
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set whether the URI patterns are applied
    pub fn filter_uri(mut self, filter: bool) -> Self {
        self.config.filter_uri = filter;
        self
    }

    /// Add an include pattern
    pub fn include_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Add an exclude pattern
    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Compile the patterns and build the configuration
    pub fn build(self) -> Result<RequestLoggingConfig, InvalidUriPattern> {
        let mut config = self.config;
        config.include_patterns = compile(&self.include)?;
        config.exclude_patterns = compile(&self.exclude)?;
        Ok(config)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<UriPattern>, InvalidUriPattern> {
    patterns.iter().map(|p| UriPattern::new(p)).collect()
}
