//! Response types for svckit
//!
//! A [`Response`] is the mutable response object a handler writes to: status,
//! headers and a body written through [`std::io::Write`]. Bytes go to the real
//! output unless a [`ContentCapture`] is active, in which case they are held
//! in memory until the capture is finalized.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::io::Write;
//! use svckit_core::Response;
//!
//! let mut res = Response::new();
//! let capture = res.capture();
//! res.write_all(b"hello")?;
//!
//! assert_eq!(capture.content(), "hello");
//! capture.finalize()?;
//! ```

use bytes::{Bytes, BytesMut};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where finalized bytes end up
enum Sink {
    /// Kept in memory, handed to the host by [`Response::into_http`]
    Memory(BytesMut),
    /// A host-provided writer
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Sink::Writer(writer) => writer.write_all(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Memory(_) => Ok(()),
            Sink::Writer(writer) => writer.flush(),
        }
    }
}

struct BodyState {
    sink: Sink,
    capture: Option<BytesMut>,
    committed: bool,
}

type SharedBody = Arc<Mutex<BodyState>>;

fn lock(body: &SharedBody) -> MutexGuard<'_, BodyState> {
    body.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Error returned when the body can no longer be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response already committed")]
pub struct ResponseCommitted;

/// HTTP Response under construction
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: SharedBody,
}

impl Response {
    /// Create a `200 OK` response whose output is kept in memory
    pub fn new() -> Self {
        Self::with_sink(Sink::Memory(BytesMut::new()))
    }

    /// Create a `200 OK` response writing to the given output
    pub fn with_output<W>(output: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::with_sink(Sink::Writer(Box::new(output)))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Arc::new(Mutex::new(BodyState {
                sink,
                capture: None,
                committed: false,
            })),
        }
    }

    /// Get the status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the status code
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the `Content-Type` header, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        crate::request::content_type(&self.headers)
    }

    /// Set the `Content-Type` header
    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    /// Get the `charset` parameter of the `Content-Type` header
    pub fn character_encoding(&self) -> Option<&str> {
        self.content_type().and_then(crate::request::charset)
    }

    /// Start buffering the body, or return the capture already in place
    ///
    /// While a capture is active nothing reaches the real output. Calling this
    /// on a response that is already being captured does not start a second
    /// buffer; it returns a handle to the existing one.
    pub fn capture(&mut self) -> ContentCapture {
        let mut state = lock(&self.body);
        if state.capture.is_none() {
            state.capture = Some(BytesMut::new());
        }
        ContentCapture {
            body: Arc::clone(&self.body),
        }
    }

    /// Check whether writes are currently being captured
    pub fn is_capturing(&self) -> bool {
        lock(&self.body).capture.is_some()
    }

    /// Check whether any bytes have reached the real output
    pub fn is_committed(&self) -> bool {
        lock(&self.body).committed
    }

    /// Discard captured bytes so the body can be replaced
    ///
    /// Fails once bytes have been written to the real output.
    pub fn reset_buffer(&mut self) -> Result<(), ResponseCommitted> {
        let mut state = lock(&self.body);
        if state.committed {
            return Err(ResponseCommitted);
        }
        if let Some(buf) = state.capture.as_mut() {
            buf.clear();
        }
        Ok(())
    }

    /// Write a complete body, replacing the content type
    pub fn write_body(&mut self, content_type: &'static str, body: &[u8]) -> io::Result<()> {
        self.set_content_type(content_type);
        self.write_all(body)
    }

    /// Finalize any capture and convert into an `http::Response`
    ///
    /// The body is empty when the response writes to a host-provided output;
    /// those bytes have already been delivered.
    pub fn into_http(self) -> io::Result<http::Response<Full<Bytes>>> {
        finalize(&self.body)?;

        let body = match &mut lock(&self.body).sink {
            Sink::Memory(buf) => buf.split().freeze(),
            Sink::Writer(_) => Bytes::new(),
        };

        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        Ok(response)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.body);
        if let Some(capture) = state.capture.as_mut() {
            capture.extend_from_slice(buf);
            return Ok(buf.len());
        }
        state.sink.write_all(buf)?;
        if !buf.is_empty() {
            state.committed = true;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = lock(&self.body);
        if state.capture.is_some() {
            return Ok(());
        }
        state.sink.flush()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("capturing", &self.is_capturing())
            .finish()
    }
}

fn finalize(body: &SharedBody) -> io::Result<()> {
    let mut state = lock(body);
    let Some(captured) = state.capture.take() else {
        return Ok(());
    };
    if !captured.is_empty() {
        state.sink.write_all(&captured)?;
        state.committed = true;
    }
    state.sink.flush()
}

/// Handle to the buffered body of a [`Response`]
///
/// Cloning the handle does not copy the buffer. The buffer is copied to the
/// real output by the first call to [`ContentCapture::finalize`]; later calls
/// do nothing.
#[derive(Clone)]
pub struct ContentCapture {
    body: SharedBody,
}

impl ContentCapture {
    /// A copy of the bytes buffered so far
    pub fn content(&self) -> Bytes {
        lock(&self.body)
            .capture
            .as_ref()
            .map(|buf| Bytes::copy_from_slice(buf))
            .unwrap_or_default()
    }

    /// Check whether the buffer has already been copied to the real output
    pub fn is_finalized(&self) -> bool {
        lock(&self.body).capture.is_none()
    }

    /// Copy the buffered bytes to the real output
    ///
    /// Subsequent writes to the response go straight to the output.
    pub fn finalize(&self) -> io::Result<()> {
        finalize(&self.body)
    }

    /// A guard that finalizes this capture when dropped
    ///
    /// Dropping covers every exit path of the scope holding the guard,
    /// including a future that is cancelled while the handler runs.
    pub fn guard(&self) -> CaptureGuard {
        CaptureGuard {
            capture: Some(self.clone()),
        }
    }
}

impl fmt::Debug for ContentCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.body);
        f.debug_struct("ContentCapture")
            .field("buffered", &state.capture.as_ref().map(BytesMut::len))
            .finish()
    }
}

/// Finalizes a [`ContentCapture`] when it goes out of scope
#[must_use = "the capture is finalized as soon as the guard is dropped"]
pub struct CaptureGuard {
    capture: Option<ContentCapture>,
}

impl CaptureGuard {
    /// Finalize now and report the outcome
    pub fn finish(mut self) -> io::Result<()> {
        match self.capture.take() {
            Some(capture) => capture.finalize(),
            None => Ok(()),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            if let Err(err) = capture.finalize() {
                tracing::warn!(error = %err, "Failed to flush captured response body");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    /// A writer whose contents stay inspectable after the response took it
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_direct_writes_reach_output() {
        let out = SharedOutput::default();
        let mut res = Response::with_output(out.clone());

        res.write_all(b"direct").unwrap();

        assert_eq!(out.contents(), b"direct");
        assert!(res.is_committed());
    }

    #[test]
    fn test_captured_writes_held_until_finalize() {
        let out = SharedOutput::default();
        let mut res = Response::with_output(out.clone());
        let capture = res.capture();

        res.write_all(b"held").unwrap();
        assert!(out.contents().is_empty());
        assert_eq!(capture.content(), "held");

        capture.finalize().unwrap();
        assert_eq!(out.contents(), b"held");
    }

    #[test]
    fn test_finalize_runs_once() {
        let out = SharedOutput::default();
        let mut res = Response::with_output(out.clone());
        let capture = res.capture();
        res.write_all(b"once").unwrap();

        capture.finalize().unwrap();
        capture.finalize().unwrap();
        capture.guard().finish().unwrap();

        assert_eq!(out.contents(), b"once");
        assert!(capture.is_finalized());
    }

    #[test]
    fn test_capture_is_idempotent() {
        let out = SharedOutput::default();
        let mut res = Response::with_output(out.clone());

        let outer = res.capture();
        res.write_all(b"a").unwrap();
        let inner = res.capture();
        res.write_all(b"b").unwrap();

        assert_eq!(outer.content(), "ab");
        assert_eq!(inner.content(), "ab");

        inner.finalize().unwrap();
        outer.finalize().unwrap();
        assert_eq!(out.contents(), b"ab");
    }

    #[test]
    fn test_guard_finalizes_on_drop() {
        let out = SharedOutput::default();
        let mut res = Response::with_output(out.clone());
        {
            let capture = res.capture();
            let _guard = capture.guard();
            res.write_all(b"dropped").unwrap();
        }

        assert_eq!(out.contents(), b"dropped");
    }

    #[test]
    fn test_reset_buffer() {
        let mut res = Response::new();
        let capture = res.capture();
        res.write_all(b"partial").unwrap();

        res.reset_buffer().unwrap();
        assert!(capture.content().is_empty());

        let mut direct = Response::new();
        direct.write_all(b"x").unwrap();
        assert_eq!(direct.reset_buffer(), Err(ResponseCommitted));
    }

    #[tokio::test]
    async fn test_into_http_finalizes_capture() {
        let mut res = Response::new();
        res.set_status(StatusCode::CREATED);
        let _capture = res.capture();
        res.write_body("text/plain", b"made").unwrap();

        let http = res.into_http().unwrap();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");

        let body = http.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "made");
    }

    #[test]
    fn test_character_encoding() {
        let mut res = Response::new();
        assert_eq!(res.character_encoding(), None);

        res.set_content_type("application/json; charset=UTF-8");
        assert_eq!(res.character_encoding(), Some("UTF-8"));
    }
}
