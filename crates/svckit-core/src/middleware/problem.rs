//! Problem translation middleware
//!
//! Turns an error returned by the inner chain into a problem response.

use super::layer::{BoxFuture, BoxedNext, HandlerResult, MiddlewareLayer};
use http::header;
use crate::problem::{self, LOG_TARGET};
use crate::request::Request;
use crate::response::Response;

/// Middleware that answers every inner error with a [`Problem`](crate::Problem)
///
/// Whatever the handler wrote before failing is discarded. Response headers
/// are kept, except `Content-Length`, which no longer matches the body, and
/// `Content-Type`, which becomes `application/problem+json`. When bytes already
/// reached the client the body can no longer be replaced; the error is logged
/// and returned unchanged.
#[derive(Clone, Default)]
pub struct ProblemLayer;

impl ProblemLayer {
    /// Create a new problem layer
    pub fn new() -> Self {
        Self
    }
}

impl MiddlewareLayer for ProblemLayer {
    fn call<'a>(
        &self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: BoxedNext,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let err = match next(req, res).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if res.reset_buffer().is_err() {
                tracing::warn!(
                    target: LOG_TARGET,
                    error = %err,
                    "Response already committed, cannot write problem"
                );
                return Err(err);
            }
            res.headers_mut().remove(header::CONTENT_LENGTH);

            problem::write_problem(&err, req, res)?;
            Ok(())
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ServiceError};
    use crate::middleware::{from_fn, LayerStack};
    use crate::problem::{Problem, PROBLEM_JSON};
    use crate::request::ProducibleMediaTypes;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use std::io::Write;

    fn request(path: &str) -> Request {
        let req = http::Request::builder().uri(path).body(()).unwrap();
        Request::from_http_request(req, "")
    }

    fn stack() -> LayerStack {
        let mut stack = LayerStack::new();
        stack.push(Box::new(ProblemLayer::new()));
        stack
    }

    async fn body_of(res: Response) -> bytes::Bytes {
        res.into_http()
            .unwrap()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
    }

    #[tokio::test]
    async fn test_success_is_untouched() {
        let handler = from_fn(|_req, res| {
            Box::pin(async move {
                res.write_body("text/plain", b"fine")?;
                Ok(())
            })
        });

        let mut req = request("/cars");
        let mut res = Response::new();
        stack().execute(&mut req, &mut res, handler).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_of(res).await, "fine");
    }

    #[tokio::test]
    async fn test_error_replaces_captured_output() {
        let handler = from_fn(|_req, res| {
            Box::pin(async move {
                res.headers_mut()
                    .insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
                res.write_all(b"half a csv")?;
                Err(AppError::from(ServiceError::new("export failed")))
            })
        });

        let mut req = request("/export");
        req.extensions_mut()
            .insert(ProducibleMediaTypes(vec!["text/csv".to_string()]));
        let mut res = Response::new();
        let _capture = res.capture();

        stack().execute(&mut req, &mut res, handler).await.unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.content_type(), Some(PROBLEM_JSON));
        assert!(req.extensions().get::<ProducibleMediaTypes>().is_none());

        let problem: Problem = serde_json::from_slice(&body_of(res).await).unwrap();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.instance.as_deref(), Some("/export"));
        assert!(problem.id.is_some());
    }

    #[tokio::test]
    async fn test_committed_response_propagates_error() {
        let handler = from_fn(|_req, res| {
            Box::pin(async move {
                res.write_all(b"streamed")?;
                Err(AppError::forbidden("late"))
            })
        });

        let mut req = request("/stream");
        let mut res = Response::new();
        let err = stack().execute(&mut req, &mut res, handler).await.unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_of(res).await, "streamed");
    }

    #[tokio::test]
    async fn test_outer_headers_survive_a_problem() {
        let handler = from_fn(|_req, res| {
            Box::pin(async move {
                res.headers_mut()
                    .insert(header::CONTENT_LENGTH, "10".parse().unwrap());
                res.write_all(b"half a csv")?;
                Err(AppError::forbidden("not yours"))
            })
        });

        let mut req = request("/cars/1");
        let mut res = Response::new();
        res.headers_mut()
            .insert("x-request-id", "abc".parse().unwrap());
        res.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
        let _capture = res.capture();

        stack().execute(&mut req, &mut res, handler).await.unwrap();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()["x-request-id"], "abc");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(res.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(res.content_type(), Some(PROBLEM_JSON));
    }
}
