//! Log entry data captured per exchange

use http::{header, HeaderMap, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use svckit_core::{ClientInfo, DEFAULT_CHARACTER_ENCODING};

static LOG_ID: AtomicU64 = AtomicU64::new(0);

/// Hand out the next log id
///
/// Ids start at 1 and are never reused for the lifetime of the process.
pub fn next_log_id() -> u64 {
    LOG_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// What was logged about a request, kept until its response is logged
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Id shared by the request and response lines
    pub id: u64,
    /// When the request entered the logging middleware
    pub started: Instant,
    /// Request method
    pub method: String,
    /// Request path
    pub uri: String,
    /// Query string, when configured and present
    pub query: Option<String>,
    /// Request content type
    pub content_type: Option<String>,
    /// Name of the thread that saw the request, when headers or payload are logged
    pub thread: Option<String>,
    /// Client details, when configured
    pub client: Option<ClientInfo>,
    /// Sorted headers, when configured
    pub headers: Option<Vec<(String, String)>>,
    /// Decoded request body, when configured
    pub payload: Option<String>,
}

impl LogEntry {
    /// The path followed by `?query` when a query is present
    pub fn uri_with_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.uri, query),
            None => self.uri.clone(),
        }
    }
}

/// What is logged about a response
#[derive(Clone, Debug)]
pub struct ResponseEntry {
    /// Final status
    pub status: StatusCode,
    /// Time spent since the request was logged
    pub duration: Duration,
    /// Response content type
    pub content_type: Option<String>,
    /// Name of the thread that saw the response, when headers or payload are logged
    pub thread: Option<String>,
    /// Sorted headers, when configured
    pub headers: Option<Vec<(String, String)>>,
    /// Decoded response body, when configured
    pub payload: Option<String>,
}

/// Collect headers for logging
///
/// Sorted by name, `Content-Type` left out, repeated headers joined with `, `.
pub fn sorted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut collected: Vec<(String, String)> = headers
        .keys()
        .filter(|name| **name != header::CONTENT_TYPE)
        .map(|name| {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (name.as_str().to_string(), values.join(", "))
        })
        .collect();
    collected.sort_by_key(|(name, _)| name.to_ascii_lowercase());
    collected
}

/// Decode at most `max_size` bytes of a body for logging
///
/// Unsupported encodings yield `[unknown]`. An empty body yields an empty string.
pub fn decode_payload(content: &[u8], encoding: Option<&str>, max_size: usize) -> String {
    if content.is_empty() {
        return String::new();
    }

    let bytes = &content[..content.len().min(max_size)];
    let encoding = encoding.unwrap_or(DEFAULT_CHARACTER_ENCODING).to_ascii_uppercase();

    match encoding.as_str() {
        "UTF-8" | "UTF8" => String::from_utf8_lossy(bytes).into_owned(),
        "ISO-8859-1" | "ISO8859-1" | "LATIN1" | "US-ASCII" | "ASCII" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => "[unknown]".to_string(),
    }
}

/// Name of the current thread, as shown in log lines
pub fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_log_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| next_log_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(id >= 1);
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn test_sorted_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert("x-trace", "t1".parse().unwrap());
        headers.append(header::ACCEPT, "text/plain".parse().unwrap());
        headers.append(header::ACCEPT, "application/json".parse().unwrap());

        assert_eq!(
            sorted_headers(&headers),
            vec![
                ("accept".to_string(), "text/plain, application/json".to_string()),
                ("x-trace".to_string(), "t1".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_payload_truncates() {
        assert_eq!(decode_payload(b"abcdef", None, 3), "abc");
        assert_eq!(decode_payload(b"abc", Some("utf-8"), 10), "abc");
        assert_eq!(decode_payload(b"", None, 10), "");
    }

    #[test]
    fn test_decode_payload_encodings() {
        assert_eq!(decode_payload(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1"), 10), "café");
        assert_eq!(decode_payload(b"x", Some("EBCDIC-FANCY"), 10), "[unknown]");
    }

    #[test]
    fn test_uri_with_query() {
        let mut entry = LogEntry {
            id: 1,
            started: Instant::now(),
            method: "GET".to_string(),
            uri: "/api/cars".to_string(),
            query: Some("page=2".to_string()),
            content_type: None,
            thread: None,
            client: None,
            headers: None,
            payload: None,
        };
        assert_eq!(entry.uri_with_query(), "/api/cars?page=2");

        entry.query = None;
        assert_eq!(entry.uri_with_query(), "/api/cars");
    }
}
