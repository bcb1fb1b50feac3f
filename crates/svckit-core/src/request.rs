//! Request types for svckit

use crate::body::{CachedBody, RequestBody};
use bytes::Bytes;
use http::{header, request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use std::io;
use std::net::SocketAddr;

/// How the host dispatched this request
///
/// Hosts re-dispatch a request to an error endpoint after a failure, or resume
/// it after asynchronous processing. Middleware that must run once per request
/// only acts on [`DispatchKind::Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchKind {
    /// The original, top-level dispatch
    #[default]
    Request,
    /// A forward to the error endpoint
    Error,
    /// A re-dispatch after asynchronous processing
    Async,
}

/// Information about the calling client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Remote socket address
    pub remote_addr: Option<SocketAddr>,
    /// Authenticated user name, if the host resolved one
    pub remote_user: Option<String>,
    /// Session identifier, if a session exists
    pub session_id: Option<String>,
}

/// Media types the host's content negotiation may produce for this request
///
/// Stored in the request extensions. Problem translation removes it so the
/// error body is written as `application/problem+json` regardless of the
/// request's `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducibleMediaTypes(pub Vec<String>);

/// Attributes describing a failed request, set by the host on an error dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAttributes {
    /// Status of the failed request
    pub status: http::StatusCode,
    /// Error message, if any
    pub message: Option<String>,
    /// URI of the original request
    pub request_uri: Option<String>,
}

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: RequestBody,
    pub(crate) client: ClientInfo,
    pub(crate) dispatch: DispatchKind,
}

impl Request {
    /// Create a new request from parts and a body
    pub fn new(parts: Parts, body: impl Into<RequestBody>) -> Self {
        Self {
            parts,
            body: body.into(),
            client: ClientInfo::default(),
            dispatch: DispatchKind::Request,
        }
    }

    /// Create a request from an `http::Request` head and a body
    pub fn from_http_request<B>(req: http::Request<B>, body: impl Into<RequestBody>) -> Self {
        let (parts, _) = req.into_parts();
        Self::new(parts, body)
    }

    /// Attach client information
    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    /// Mark how this request was dispatched
    pub fn with_dispatch(mut self, dispatch: DispatchKind) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the query string
    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Get the `Content-Type` header, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        content_type(&self.parts.headers)
    }

    /// Get the `charset` parameter of the `Content-Type` header
    pub fn character_encoding(&self) -> Option<&str> {
        self.content_type().and_then(charset)
    }

    /// Get the client information
    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Get the dispatch kind
    pub fn dispatch(&self) -> DispatchKind {
        self.dispatch
    }

    /// Get the body
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Check whether the body has been buffered for repeated reads
    pub fn is_body_cached(&self) -> bool {
        self.body.is_cached()
    }

    /// Buffer the body so it can be read any number of times
    ///
    /// Calling this on a request whose body is already cached returns the
    /// existing cache without reading anything.
    pub async fn cache_body(&mut self) -> io::Result<&CachedBody> {
        if !self.body.is_cached() {
            let encoding = self.character_encoding().map(str::to_owned);
            let body = std::mem::take(&mut self.body);
            self.body = RequestBody::Cached(CachedBody::read_from(body, encoding).await?);
        }

        match &self.body {
            RequestBody::Cached(cached) => Ok(cached),
            _ => Err(io::Error::new(io::ErrorKind::Other, "request body was not cached")),
        }
    }

    /// The cached body, if the body has been buffered
    pub fn cached_body(&self) -> Option<&CachedBody> {
        match &self.body {
            RequestBody::Cached(cached) => Some(cached),
            _ => None,
        }
    }

    /// Read the body
    ///
    /// Without caching the body is a one-shot stream: the first call consumes
    /// it and later calls return empty bytes. After [`Request::cache_body`]
    /// every call returns the full body.
    pub async fn read_body(&mut self) -> io::Result<Bytes> {
        self.body.read_all().await
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

pub(crate) fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

/// Extract the `charset` parameter from a media type
pub fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &'static str, content_type: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(Method::POST).uri("/api/cars?page=2");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        Request::from_http_request(builder.body(()).unwrap(), body)
    }

    #[test]
    fn test_charset_parsing() {
        assert_eq!(charset("application/json; charset=ISO-8859-1"), Some("ISO-8859-1"));
        assert_eq!(charset("text/plain;Charset=\"utf-8\""), Some("utf-8"));
        assert_eq!(charset("application/json"), None);
    }

    #[test]
    fn test_request_accessors() {
        let req = request("", Some("application/json; charset=UTF-8"));

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/api/cars");
        assert_eq!(req.query_string(), Some("page=2"));
        assert_eq!(req.character_encoding(), Some("UTF-8"));
        assert_eq!(req.dispatch(), DispatchKind::Request);
    }

    #[tokio::test]
    async fn test_cache_body_keeps_encoding_and_content() {
        let mut req = request("{\"plate\":\"AB-12\"}", Some("application/json; charset=ISO-8859-1"));

        let cached = req.cache_body().await.unwrap();
        assert_eq!(cached.character_encoding(), "ISO-8859-1");
        assert!(req.is_body_cached());

        assert_eq!(req.read_body().await.unwrap(), "{\"plate\":\"AB-12\"}");
        assert_eq!(req.read_body().await.unwrap(), "{\"plate\":\"AB-12\"}");
    }

    #[tokio::test]
    async fn test_cache_body_twice_is_noop() {
        let mut req = request("abc", None);
        req.cache_body().await.unwrap();
        let again = req.cache_body().await.unwrap();

        assert_eq!(again.content(), "abc");
    }

    #[tokio::test]
    async fn test_uncached_body_reads_once() {
        let mut req = request("abc", None);

        assert_eq!(req.read_body().await.unwrap(), "abc");
        assert!(req.read_body().await.unwrap().is_empty());
        assert!(req.cached_body().is_none());
    }
}
