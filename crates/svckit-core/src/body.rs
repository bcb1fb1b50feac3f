//! Request body types for svckit
//!
//! A request body arrives as a forward-only stream of byte chunks. Reading it
//! consumes it. [`CachedBody`] drains such a stream once into memory and then
//! hands out a fresh cursor on every read, so the same bytes can be seen by
//! the downstream handler and by the request logger.
//!
//! # Example
//!
//! ```rust,ignore
//! use svckit_core::{CachedBody, RequestBody};
//!
//! let body = RequestBody::from("hello");
//! let cached = CachedBody::read_from(body, None).await?;
//!
//! assert_eq!(cached.content(), "hello");
//! assert_eq!(cached.content(), "hello");
//! ```

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use std::fmt;
use std::io::{self, Cursor};
use std::pin::Pin;

/// Character encoding assumed when the request does not declare one
pub const DEFAULT_CHARACTER_ENCODING: &str = "UTF-8";

/// A boxed one-shot stream of body chunks
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// The body of an incoming request
pub enum RequestBody {
    /// No body, or a body that has already been consumed
    Empty,
    /// A forward-only stream that can be read exactly once
    Stream(BodyStream),
    /// A fully buffered body that can be read any number of times
    Cached(CachedBody),
}

impl RequestBody {
    /// Wrap a stream of chunks as a one-shot body
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Check whether the body has been buffered
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// Read the remaining body into memory
    ///
    /// A streaming body is consumed by this call and replaced with
    /// [`RequestBody::Empty`], so a second read returns no bytes. A cached body
    /// is left untouched and returns its full content every time.
    pub async fn read_all(&mut self) -> io::Result<Bytes> {
        if let Self::Cached(cached) = self {
            return Ok(cached.content().clone());
        }

        match std::mem::replace(self, Self::Empty) {
            Self::Stream(stream) => drain(stream).await,
            _ => Ok(Bytes::new()),
        }
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::Empty
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        Self::from_stream(stream::once(async move { Ok(bytes) }))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("RequestBody::Empty"),
            Self::Stream(_) => f.write_str("RequestBody::Stream(..)"),
            Self::Cached(cached) => f.debug_tuple("RequestBody::Cached").field(cached).finish(),
        }
    }
}

/// A request body buffered in memory
///
/// Created by draining the original stream to its end. Every call to
/// [`CachedBody::reader`] or [`CachedBody::stream`] starts again at the first
/// byte.
#[derive(Clone)]
pub struct CachedBody {
    content: Bytes,
    encoding: Option<String>,
}

impl CachedBody {
    /// Buffer the given body completely
    ///
    /// The declared character encoding is kept alongside the bytes. A read
    /// failure in the underlying stream is returned as is; a partially read
    /// body is never reported as complete.
    pub async fn read_from(body: RequestBody, encoding: Option<String>) -> io::Result<Self> {
        let content = match body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Stream(stream) => drain(stream).await?,
            RequestBody::Cached(cached) => {
                return Ok(Self {
                    encoding: encoding.or(cached.encoding),
                    content: cached.content,
                })
            }
        };

        Ok(Self { content, encoding })
    }

    /// Create a cached body from bytes already in memory
    pub fn from_bytes(content: impl Into<Bytes>, encoding: Option<String>) -> Self {
        Self {
            content: content.into(),
            encoding,
        }
    }

    /// The buffered bytes
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Check whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The declared character encoding, or [`DEFAULT_CHARACTER_ENCODING`]
    pub fn character_encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or(DEFAULT_CHARACTER_ENCODING)
    }

    /// A fresh blocking reader positioned at the first byte
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.content.clone())
    }

    /// A fresh chunk stream yielding the whole body
    pub fn stream(&self) -> BodyStream {
        let content = self.content.clone();
        Box::pin(stream::once(async move { Ok(content) }))
    }
}

impl fmt::Debug for CachedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedBody")
            .field("len", &self.content.len())
            .field("encoding", &self.character_encoding())
            .finish()
    }
}

async fn drain(mut stream: BodyStream) -> io::Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
