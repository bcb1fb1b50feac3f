//! Middleware infrastructure for svckit
//!
//! # Example
//!
//! ```rust,ignore
//! use svckit_core::middleware::{from_fn, LayerStack, ProblemLayer};
//!
//! let mut stack = LayerStack::new();
//! stack.push(Box::new(ProblemLayer::new()));
//!
//! let handler = from_fn(|_req, _res| Box::pin(async move {
//!     Err(AppError::forbidden("no access"))
//! }));
//! stack.execute(&mut req, &mut res, handler).await?;
//! ```

mod layer;
mod problem;

pub use layer::{from_fn, BoxFuture, BoxedNext, HandlerResult, LayerStack, MiddlewareLayer};
pub use problem::ProblemLayer;
