//! # svckit Core
//!
//! Core library providing the foundational types and traits for svckit.
//!
//! This crate is not meant to be used directly. Use `svckit-rs` instead.

mod body;
mod error;
pub mod middleware;
pub mod problem;
mod request;
mod response;

// Public API
pub use body::{BodyStream, CachedBody, RequestBody, DEFAULT_CHARACTER_ENCODING};
pub use error::{AppError, BoxError, ExposePolicy, Result, ServiceError, ValidationError};
pub use middleware::{
    from_fn, BoxFuture, BoxedNext, HandlerResult, LayerStack, MiddlewareLayer, ProblemLayer,
};
pub use problem::{ConstraintViolation, Problem, PROBLEM_JSON};
pub use request::{charset, ClientInfo, DispatchKind, ErrorAttributes, ProducibleMediaTypes, Request};
pub use response::{CaptureGuard, ContentCapture, Response, ResponseCommitted};
