//! Middleware chain for svckit
//!
//! A layer receives the request, the response being built and the rest of the
//! chain as [`BoxedNext`]. It may act before and after calling `next`, or not
//! call it at all.

use crate::error::AppError;
use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future borrowing the request and response
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a handler or layer
///
/// An `Err` travels outwards through the chain until a layer translates it.
pub type HandlerResult = Result<(), AppError>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<
    dyn for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync,
>;

/// Box a handler closure as a [`BoxedNext`]
///
/// ```rust,ignore
/// let handler = from_fn(|_req, res| Box::pin(async move {
///     res.write_all(b"hello")?;
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(f: F) -> BoxedNext
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Trait for middleware that can be applied to svckit
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: BoxedNext,
    ) -> BoxFuture<'a, HandlerResult>;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers are executed in the order they are added (outermost first).
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Add a middleware layer to the beginning of the stack
    ///
    /// This layer will be executed first (outermost).
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Compose the layers around a handler into a single [`BoxedNext`]
    pub fn wrap(&self, handler: BoxedNext) -> BoxedNext {
        // Build the chain from inside out
        let mut next = handler;

        for layer in self.layers.iter().rev() {
            let layer = layer.clone_box();
            let inner = next;
            next = from_fn(move |req, res| layer.call(req, res, inner.clone()));
        }

        next
    }

    /// Execute the middleware stack with a final handler
    pub fn execute<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
        handler: BoxedNext,
    ) -> BoxFuture<'a, HandlerResult> {
        if self.layers.is_empty() {
            return handler(req, res);
        }
        self.wrap(handler)(req, res)
    }
}
