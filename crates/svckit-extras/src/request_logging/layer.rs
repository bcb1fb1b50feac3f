//! Request logging middleware layer

use super::config::RequestLoggingConfig;
use super::entry::{
    current_thread_name, decode_payload, next_log_id, sorted_headers, LogEntry, ResponseEntry,
};
use super::formats::{format_duration, ExchangeFormatter, TextFormatter};
use std::sync::Arc;
use std::time::Instant;
use svckit_core::{
    BoxFuture, BoxedNext, ContentCapture, DispatchKind, HandlerResult, MiddlewareLayer, Request,
    Response,
};

/// Log target of request and response messages
pub const LOG_TARGET: &str = "svckit::request_logging";

/// Marks a request that has already passed a logging layer
#[derive(Clone, Copy, Debug)]
struct AlreadyLogged;

/// Middleware that logs every exchange it lets through
///
/// For each logged request:
///
/// 1. the request body is buffered when payloads are logged, so the handler
///    still reads the complete body
/// 2. the response body is captured
/// 3. the request message is logged and the rest of the chain runs
/// 4. the response message is logged, then the captured body is released to
///    the real output
///
/// The captured body is released on every exit path, including an error from
/// the chain and a cancelled request. Errors pass through untouched. When the
/// chain panics or the request is cancelled there is no final response to
/// describe; an `ABORTED` line is logged at WARN instead, before the body is
/// released.
///
/// Error dispatches, async re-dispatches and requests already seen by a
/// logging layer are passed through without logging.
#[derive(Clone)]
pub struct RequestLoggingLayer {
    config: Arc<RequestLoggingConfig>,
    formatter: Arc<dyn ExchangeFormatter>,
}

impl RequestLoggingLayer {
    /// Create a new logging layer with the text formatter
    pub fn new(config: RequestLoggingConfig) -> Self {
        Self {
            config: Arc::new(config),
            formatter: Arc::new(TextFormatter::new()),
        }
    }

    /// Replace the formatter
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: ExchangeFormatter + 'static,
    {
        self.formatter = Arc::new(formatter);
        self
    }

    /// The configuration of this layer
    pub fn config(&self) -> &RequestLoggingConfig {
        &self.config
    }
}

impl Default for RequestLoggingLayer {
    fn default() -> Self {
        Self::new(RequestLoggingConfig::default())
    }
}

impl MiddlewareLayer for RequestLoggingLayer {
    fn call<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: BoxedNext,
    ) -> BoxFuture<'a, HandlerResult> {
        let config = self.config.clone();
        let formatter = self.formatter.clone();

        Box::pin(async move {
            if req.dispatch() != DispatchKind::Request
                || req.extensions().get::<AlreadyLogged>().is_some()
                || !config.should_log(req.path())
            {
                return next(req, res).await;
            }
            req.extensions_mut().insert(AlreadyLogged);

            if config.include_payload {
                req.cache_body().await?;
            }
            let capture = res.capture();
            let guard = capture.guard();

            let entry = request_entry(&config, req);
            tracing::info!(
                target: LOG_TARGET,
                log_id = entry.id,
                "{}",
                formatter.format_request(&entry)
            );

            let abort_log = AbortLog::new(&entry);
            let result = next(req, res).await;
            abort_log.disarm();

            let response = response_entry(&config, &entry, res, &capture);
            tracing::info!(
                target: LOG_TARGET,
                log_id = entry.id,
                "{}",
                formatter.format_response(&entry, &response)
            );

            if let Err(err) = guard.finish() {
                if result.is_ok() {
                    return Err(err.into());
                }
                tracing::warn!(
                    target: LOG_TARGET,
                    log_id = entry.id,
                    error = %err,
                    "Failed to flush captured response body"
                );
            }
            result
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

/// Logs the exchange as aborted unless disarmed before it is dropped
struct AbortLog<'a> {
    entry: &'a LogEntry,
    armed: bool,
}

impl<'a> AbortLog<'a> {
    fn new(entry: &'a LogEntry) -> Self {
        Self { entry, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortLog<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                target: LOG_TARGET,
                log_id = self.entry.id,
                "{} < ABORTED [{}] {} {}",
                self.entry.id,
                format_duration(self.entry.started.elapsed()),
                self.entry.method,
                self.entry.uri_with_query()
            );
        }
    }
}

fn request_entry(config: &RequestLoggingConfig, req: &Request) -> LogEntry {
    let payload = config.include_payload.then(|| {
        req.cached_body()
            .map(|body| {
                decode_payload(
                    body.content(),
                    Some(body.character_encoding()),
                    config.max_payload_size,
                )
            })
            .unwrap_or_default()
    });

    LogEntry {
        id: next_log_id(),
        started: Instant::now(),
        method: req.method().to_string(),
        uri: req.path().to_string(),
        query: req
            .query_string()
            .filter(|q| config.include_query_string && !q.trim().is_empty())
            .map(str::to_owned),
        content_type: req.content_type().map(str::to_owned),
        thread: (config.include_headers || config.include_payload).then(current_thread_name),
        client: config.include_client_info.then(|| req.client().clone()),
        headers: config.include_headers.then(|| sorted_headers(req.headers())),
        payload,
    }
}

fn response_entry(
    config: &RequestLoggingConfig,
    entry: &LogEntry,
    res: &Response,
    capture: &ContentCapture,
) -> ResponseEntry {
    ResponseEntry {
        status: res.status(),
        duration: entry.started.elapsed(),
        content_type: res.content_type().map(str::to_owned),
        thread: (config.include_headers || config.include_payload).then(current_thread_name),
        headers: config.include_headers.then(|| sorted_headers(res.headers())),
        payload: config.include_payload.then(|| {
            decode_payload(
                &capture.content(),
                res.character_encoding(),
                config.max_payload_size,
            )
        }),
    }
}
