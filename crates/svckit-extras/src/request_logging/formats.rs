//! Formatters for request and response log messages

use super::entry::{LogEntry, ResponseEntry};
use serde_json::json;
use std::fmt::Write;
use std::time::Duration;

/// Renders the request and response messages of one exchange
pub trait ExchangeFormatter: Send + Sync {
    /// Format the message logged before the handler runs
    fn format_request(&self, entry: &LogEntry) -> String;

    /// Format the message logged after the handler returned
    fn format_response(&self, entry: &LogEntry, response: &ResponseEntry) -> String;
}

/// Format a duration with the coarsest units that are non-zero
///
/// `45 ms`, `1.500 sec`, `2 min 3.045 sec`, `1 hrs 1 min 1.000 sec`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let ms = millis % 1000;

    if hours > 0 {
        format!("{} hrs {} min {}.{:03} sec", hours, minutes, seconds, ms)
    } else if minutes > 0 {
        format!("{} min {}.{:03} sec", minutes, seconds, ms)
    } else if seconds > 0 {
        format!("{}.{:03} sec", seconds, ms)
    } else {
        format!("{} ms", ms)
    }
}

fn content_type(value: Option<&str>) -> &str {
    value.unwrap_or("none (no body)")
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Plain text, one line per item, every line prefixed with the log id
///
/// ```text
/// 7 > REQUEST POST /api/cars?dry=true content-type=application/json
/// 7 > thread:[tokio-runtime-worker]
/// 7 > accept: application/json
/// 7 > content-type=application/json
/// {"plate":"AB-12"}
/// ```
#[derive(Clone, Debug, Default)]
pub struct TextFormatter;

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self
    }
}

impl ExchangeFormatter for TextFormatter {
    fn format_request(&self, entry: &LogEntry) -> String {
        let id = entry.id;
        let mut msg = String::new();

        let _ = write!(
            msg,
            "{} > REQUEST {} {} content-type={}",
            id,
            entry.method,
            entry.uri_with_query(),
            content_type(entry.content_type.as_deref())
        );

        if let Some(thread) = &entry.thread {
            let _ = write!(msg, "\n{} > thread:[{}]", id, thread);
        }

        if let Some(client) = &entry.client {
            let _ = write!(msg, "\n{} > ClientInfo:", id);
            if let Some(addr) = client.remote_addr {
                let _ = write!(msg, " remoteAddr={}", addr.ip());
            }
            if let Some(user) = client.remote_user.as_deref().filter(|u| !is_blank(u)) {
                let _ = write!(msg, " remoteUser={}", user);
            }
            if let Some(session) = &client.session_id {
                let _ = write!(msg, " sessionId={}", session);
            }
        }

        for (name, value) in entry.headers.iter().flatten() {
            let _ = write!(msg, "\n{} > {}: {}", id, name, value);
        }

        if let Some(payload) = entry.payload.as_deref().filter(|p| !is_blank(p)) {
            let _ = write!(
                msg,
                "\n{} > content-type={}\n{}",
                id,
                content_type(entry.content_type.as_deref()),
                payload
            );
        }

        msg
    }

    fn format_response(&self, entry: &LogEntry, response: &ResponseEntry) -> String {
        let id = entry.id;
        let mut msg = String::new();

        let _ = write!(msg, "{} < RESPONSE {}", id, response.status.as_u16());
        if let Some(reason) = response.status.canonical_reason() {
            let _ = write!(msg, " ({})", reason);
        }
        let _ = write!(
            msg,
            " [{}] {} {} content-type={}",
            format_duration(response.duration),
            entry.method,
            entry.uri_with_query(),
            content_type(response.content_type.as_deref())
        );

        if let Some(thread) = &response.thread {
            let _ = write!(msg, "\n{} < thread:[{}]", id, thread);
        }

        for (name, value) in response.headers.iter().flatten() {
            let _ = write!(msg, "\n{} < {}: {}", id, name, value);
        }

        if let Some(payload) = response.payload.as_deref().filter(|p| !is_blank(p)) {
            let _ = write!(
                msg,
                "\n{} < content-type={}\n{}",
                id,
                content_type(response.content_type.as_deref()),
                payload
            );
        }

        msg
    }
}

/// One JSON object per message
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    /// Whether to pretty print JSON
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pretty-printing JSON formatter
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

fn headers_json(headers: &[(String, String)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(name, value)| (name.clone(), json!(value)))
        .collect();
    serde_json::Value::Object(map)
}

impl ExchangeFormatter for JsonFormatter {
    fn format_request(&self, entry: &LogEntry) -> String {
        let mut obj = json!({
            "id": entry.id,
            "direction": "request",
            "http.method": entry.method,
            "http.url": entry.uri,
        });

        if let Some(ref query) = entry.query {
            obj["http.query"] = json!(query);
        }
        if let Some(ref content_type) = entry.content_type {
            obj["http.content_type"] = json!(content_type);
        }
        if let Some(ref thread) = entry.thread {
            obj["thread"] = json!(thread);
        }
        if let Some(ref client) = entry.client {
            obj["client.ip"] = json!(client.remote_addr.map(|a| a.ip().to_string()));
            obj["client.user"] = json!(client.remote_user);
            obj["client.session_id"] = json!(client.session_id);
        }
        if let Some(ref headers) = entry.headers {
            obj["http.request.headers"] = headers_json(headers);
        }
        if let Some(payload) = entry.payload.as_deref().filter(|p| !is_blank(p)) {
            obj["http.request.body"] = json!(payload);
        }

        self.render(&obj)
    }

    fn format_response(&self, entry: &LogEntry, response: &ResponseEntry) -> String {
        let mut obj = json!({
            "id": entry.id,
            "direction": "response",
            "http.method": entry.method,
            "http.url": entry.uri,
            "http.status_code": response.status.as_u16(),
            "duration_ms": response.duration.as_millis() as u64,
            "duration": format_duration(response.duration),
        });

        if let Some(ref query) = entry.query {
            obj["http.query"] = json!(query);
        }
        if let Some(ref content_type) = response.content_type {
            obj["http.content_type"] = json!(content_type);
        }
        if let Some(ref thread) = response.thread {
            obj["thread"] = json!(thread);
        }
        if let Some(ref headers) = response.headers {
            obj["http.response.headers"] = headers_json(headers);
        }
        if let Some(payload) = response.payload.as_deref().filter(|p| !is_blank(p)) {
            obj["http.response.body"] = json!(payload);
        }

        self.render(&obj)
    }
}
