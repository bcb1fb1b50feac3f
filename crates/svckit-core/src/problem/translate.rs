//! Mapping of [`AppError`] to [`Problem`]
//!
//! Every error is answered with the same problem shape. What differs per
//! variant is the status, the `type`, whether the message reaches the caller
//! and how much of the error ends up in the server log.

use super::model::{Problem, MSG_VIOLATIONS, TYPE_CONSTRAINT_VIOLATION, TYPE_TRACEABLE_PROBLEM};
use crate::error::{AppError, ValidationError};
use crate::middleware::{from_fn, BoxedNext, HandlerResult};
use crate::request::{ErrorAttributes, ProducibleMediaTypes, Request};
use crate::response::Response;
use http::StatusCode;
use std::error::Error as StdError;
use std::fmt;
use tracing::Level;

/// Log target of the translator
pub const LOG_TARGET: &str = "svckit::problem";

/// Translate an error into the problem returned to the caller
///
/// `instance` is the path of the failed request. The error is logged as a side
/// effect:
///
/// - a service error with a hidden message logs its id and message
/// - an illegal argument always logs the full cause chain
/// - every other variant logs its message, and the cause chain only when
///   `TRACE` is enabled for [`LOG_TARGET`]
pub fn translate(err: &AppError, instance: Option<&str>) -> Problem {
    let problem = match err {
        AppError::Service(service) => {
            let expose = service.expose_details();
            if !expose {
                log_exception(
                    format_args!(
                        "Unexposed exception details - UUID = {} --> {}",
                        service.id(),
                        service
                    ),
                    err,
                    false,
                );
            }

            let mut problem = Problem::new(service.status())
                .with_type(TYPE_TRACEABLE_PROBLEM)
                .with_id(service.id());
            if expose {
                problem = problem.with_detail(service.message());
            }
            if let Some(code) = service.code() {
                problem = problem.with_code(code);
            }
            problem
        }
        AppError::Unauthorized(message) => {
            log_exception(format_args!("*** ACCESS DENIED *** {}", message), err, false);
            Problem::new(StatusCode::UNAUTHORIZED)
        }
        AppError::Forbidden(message) => {
            log_exception(format_args!("*** ACCESS DENIED *** {}", message), err, false);
            Problem::new(StatusCode::FORBIDDEN)
        }
        AppError::IllegalArgument { message, .. } => {
            log_exception(format_args!("Illegal argument: {}", message), err, true);
            Problem::new(StatusCode::BAD_REQUEST)
        }
        AppError::ResponseStatus { status, .. } => {
            if status.is_client_error() || status.is_server_error() {
                log_exception(format_args!("Response status: {} ({})", status, err), err, false);
            }
            Problem::new(*status)
        }
        AppError::TypeMismatch { .. } => {
            log_exception(format_args!("Type mismatch: {}", err), err, false);
            Problem::new(StatusCode::BAD_REQUEST).with_detail(err.to_string())
        }
        AppError::Validation(ValidationError::ConstraintViolations(violations)) => {
            log_exception(format_args!("Validation failed: {}", err), err, false);
            Problem::new(StatusCode::BAD_REQUEST)
                .with_type(TYPE_CONSTRAINT_VIOLATION)
                .with_detail(MSG_VIOLATIONS)
                .with_violations(violations.clone())
        }
        AppError::Validation(ValidationError::Invalid(message)) => {
            log_exception(format_args!("Validation failed: {}", message), err, false);
            Problem::new(StatusCode::BAD_REQUEST).with_detail(message.clone())
        }
        AppError::Unclassified(_) => {
            tracing::warn!(
                target: LOG_TARGET,
                details = %ErrorChain(err),
                "Uncaught exception"
            );
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    match instance {
        Some(instance) => problem.with_instance(instance),
        None => problem,
    }
}

/// Translate the error, then write the problem to the response
///
/// The producible media types recorded on the request are removed first, so
/// the host never answers `406 Not Acceptable` instead of the problem.
pub fn write_problem(
    err: &AppError,
    req: &mut Request,
    res: &mut Response,
) -> std::io::Result<Problem> {
    req.extensions_mut().remove::<ProducibleMediaTypes>();

    let problem = translate(err, Some(req.path()));
    problem.write_to(res)?;
    Ok(problem)
}

/// Handler for error dispatches
///
/// Renders the [`ErrorAttributes`] the host attached to the request. Without
/// attributes the answer is `500 Internal Server Error`.
pub fn error_endpoint() -> BoxedNext {
    from_fn(|req, res| Box::pin(async move { render_error_attributes(req, res) }))
}

fn render_error_attributes(req: &mut Request, res: &mut Response) -> HandlerResult {
    req.extensions_mut().remove::<ProducibleMediaTypes>();

    let (status, message, request_uri) = match req.extensions().get::<ErrorAttributes>() {
        Some(attrs) => (attrs.status, attrs.message.clone(), attrs.request_uri.clone()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
    };

    let mut problem = Problem::new(status);
    if let Some(detail) = message.filter(|m| !m.trim().is_empty()) {
        problem = problem.with_detail(detail);
    }
    if let Some(instance) = request_uri.filter(|u| !u.trim().is_empty()) {
        problem = problem.with_instance(instance);
    }

    problem.write_to(res)?;
    Ok(())
}

fn log_exception(message: fmt::Arguments<'_>, err: &AppError, always_details: bool) {
    tracing::warn!(target: LOG_TARGET, "{}", message);
    if always_details {
        tracing::warn!(target: LOG_TARGET, details = %ErrorChain(err), "Exception details");
    } else if tracing::enabled!(target: LOG_TARGET, Level::TRACE) {
        tracing::trace!(target: LOG_TARGET, details = %ErrorChain(err), "Exception details");
    }
}

/// Renders an error followed by its sources, one per line
struct ErrorChain<'a>(&'a (dyn StdError + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, "\nCaused by: {}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExposePolicy, ServiceError};
    use crate::problem::{ConstraintViolation, PROBLEM_JSON, TYPE_PROBLEM};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct EventCapture {
        events: Arc<Mutex<Vec<(Level, String)>>>,
    }

    impl EventCapture {
        fn messages(&self, level: Level) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.events
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if !self.0.is_empty() {
                self.0.push(' ');
            }
            if field.name() == "message" {
                self.0.push_str(&format!("{:?}", value));
            } else {
                self.0.push_str(&format!("{}={:?}", field.name(), value));
            }
        }
    }

    fn capture() -> (EventCapture, tracing::subscriber::DefaultGuard) {
        let capture = EventCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    #[test]
    fn test_service_error_without_status_is_500() {
        let err = AppError::from(ServiceError::new("Car 42 not found"));
        let problem = translate(&err, Some("/api/cars/42"));

        assert_eq!(problem.status, 500);
        assert_eq!(problem.problem_type, TYPE_TRACEABLE_PROBLEM);
        assert!(problem.detail.is_none());
        assert!(problem.id.is_some());
        assert_eq!(problem.instance.as_deref(), Some("/api/cars/42"));
    }

    #[test]
    fn test_exposed_service_error() {
        let service = ServiceError::new("Car 42 not found")
            .with_status(StatusCode::NOT_FOUND)
            .with_code("CAR-404");
        let id = service.id();
        let problem = translate(&AppError::from(service), None);

        assert_eq!(problem.status, 404);
        assert_eq!(problem.title, "Not Found");
        assert_eq!(problem.detail.as_deref(), Some("Car 42 not found"));
        assert_eq!(problem.code.as_deref(), Some("CAR-404"));
        assert_eq!(problem.id, Some(id));
    }

    #[test]
    fn test_hidden_service_error_logs_id() {
        let (capture, _guard) = capture();
        let service = ServiceError::new("db down")
            .with_status(StatusCode::NOT_FOUND)
            .with_expose(ExposePolicy::Never);
        let id = service.id();

        let problem = translate(&AppError::from(service), None);

        assert!(problem.detail.is_none());
        assert_eq!(problem.id, Some(id));
        let warnings = capture.messages(Level::WARN);
        assert_eq!(
            warnings,
            vec![format!("Unexposed exception details - UUID = {} --> db down", id)]
        );
    }

    #[test]
    fn test_unauthorized_never_exposes_message() {
        let problem = translate(&AppError::unauthorized("bad token"), Some("/api"));

        assert_eq!(problem.status, 401);
        assert!(problem.detail.is_none());
        assert!(!serde_json::to_string(&problem).unwrap().contains("bad token"));
    }

    #[test]
    fn test_forbidden_never_exposes_message() {
        let problem = translate(&AppError::forbidden("not your car"), None);

        assert_eq!(problem.status, 403);
        assert_eq!(problem.problem_type, TYPE_PROBLEM);
        assert!(problem.detail.is_none());
    }

    #[test]
    fn test_illegal_argument_always_logs_details() {
        let (capture, _guard) = capture();
        let problem = translate(&AppError::illegal_argument("negative mileage"), None);

        assert_eq!(problem.status, 400);
        assert!(problem.detail.is_none());
        let warnings = capture.messages(Level::WARN);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0], "Illegal argument: negative mileage");
        assert!(warnings[1].starts_with("Exception details"));
    }

    #[test]
    fn test_constraint_violations() {
        let err = AppError::constraint_violations(vec![ConstraintViolation::new(
            "car.licensePlate",
            "must not be blank",
        )]);
        let problem = translate(&err, None);

        assert_eq!(problem.status, 400);
        assert_eq!(problem.problem_type, TYPE_CONSTRAINT_VIOLATION);
        assert_eq!(problem.detail.as_deref(), Some(MSG_VIOLATIONS));
        assert_eq!(
            problem.violations,
            vec![ConstraintViolation::new("car.licensePlate", "must not be blank")]
        );
    }

    #[test]
    fn test_plain_validation_error_keeps_message() {
        let problem = translate(&AppError::invalid("unsupported unit"), None);

        assert_eq!(problem.status, 400);
        assert_eq!(problem.detail.as_deref(), Some("unsupported unit"));
        assert!(problem.violations.is_empty());
    }

    #[test]
    fn test_type_mismatch_detail() {
        let problem = translate(&AppError::type_mismatch("id", "abc"), None);

        assert_eq!(problem.status, 400);
        assert_eq!(
            problem.detail.as_deref(),
            Some("Invalid value 'abc' for parameter 'id'")
        );
    }

    #[test]
    fn test_response_status_logging_only_for_errors() {
        let (capture, _guard) = capture();

        let problem = translate(&AppError::status(StatusCode::NOT_MODIFIED), None);
        assert_eq!(problem.status, 304);
        assert!(capture.messages(Level::WARN).is_empty());

        let problem = translate(&AppError::status(StatusCode::NOT_FOUND), None);
        assert_eq!(problem.status, 404);
        assert!(problem.detail.is_none());
        assert_eq!(
            capture.messages(Level::WARN),
            vec!["Response status: 404 Not Found (404 Not Found)".to_string()]
        );
    }

    #[test]
    fn test_unclassified_error_is_hidden() {
        let (capture, _guard) = capture();
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let problem = translate(&AppError::from(io), None);

        assert_eq!(problem.status, 500);
        assert!(problem.detail.is_none());
        let warnings = capture.messages(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Uncaught exception"));
        assert!(warnings[0].contains("disk on fire"));
    }

    #[test]
    fn test_error_chain_rendering() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let err = AppError::from(ServiceError::new("fetch failed").with_source(io));

        assert_eq!(
            ErrorChain(&err).to_string(),
            "fetch failed\nCaused by: socket timeout"
        );
    }

    #[tokio::test]
    async fn test_write_problem_clears_producible_media_types() {
        let parts = http::Request::builder()
            .uri("/api/cars")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let mut req = Request::new(parts, "");
        req.extensions_mut()
            .insert(ProducibleMediaTypes(vec!["text/csv".to_string()]));
        let mut res = Response::new();

        let problem = write_problem(&AppError::forbidden("no"), &mut req, &mut res).unwrap();

        assert!(req.extensions().get::<ProducibleMediaTypes>().is_none());
        assert_eq!(problem.instance.as_deref(), Some("/api/cars"));
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.content_type(), Some(PROBLEM_JSON));
    }

    #[tokio::test]
    async fn test_error_endpoint_renders_attributes() {
        let parts = http::Request::builder()
            .uri("/error")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let mut req = Request::new(parts, "");
        req.extensions_mut().insert(ErrorAttributes {
            status: StatusCode::NOT_FOUND,
            message: Some("No static resource".to_string()),
            request_uri: Some("/missing".to_string()),
        });
        let mut res = Response::new();

        error_endpoint()(&mut req, &mut res).await.unwrap();

        let body = res_body(res);
        let problem: Problem = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.status, 404);
        assert_eq!(problem.title, "Not Found");
        assert_eq!(problem.detail.as_deref(), Some("No static resource"));
        assert_eq!(problem.instance.as_deref(), Some("/missing"));
    }

    #[tokio::test]
    async fn test_error_endpoint_defaults_to_500() {
        let parts = http::Request::builder()
            .uri("/error")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let mut req = Request::new(parts, "");
        req.extensions_mut().insert(ErrorAttributes {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("   ".to_string()),
            request_uri: None,
        });
        let mut res = Response::new();

        error_endpoint()(&mut req, &mut res).await.unwrap();

        let problem: Problem = serde_json::from_slice(&res_body(res)).unwrap();
        assert_eq!(problem.status, 500);
        assert!(problem.detail.is_none());
        assert!(problem.instance.is_none());
    }

    fn res_body(res: Response) -> bytes::Bytes {
        let http = res.into_http().unwrap();
        futures_util::FutureExt::now_or_never(http_body_util::BodyExt::collect(http.into_body()))
            .unwrap()
            .unwrap()
            .to_bytes()
    }
}
