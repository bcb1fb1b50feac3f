//! Error types for svckit
//!
//! Handlers report failures by returning an [`AppError`]. The variants form a
//! closed taxonomy that the problem translator maps to an HTTP status and a
//! [`Problem`](crate::problem::Problem) body.

use crate::problem::ConstraintViolation;
use http::StatusCode;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A boxed error usable as an error source
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias for svckit operations
pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Application error raised by a handler
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A declared backend error with its own status and exposure policy
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The caller is not authenticated
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// An argument supplied by the caller is not acceptable
    #[error("{message}")]
    IllegalArgument {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A request parameter could not be converted to its target type
    #[error("Invalid value '{value}' for parameter '{name}'")]
    TypeMismatch {
        name: String,
        value: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The handler asked for a specific response status
    #[error("{status}{}", reason_suffix(.reason))]
    ResponseStatus {
        status: StatusCode,
        reason: Option<String>,
    },

    /// Anything else
    #[error(transparent)]
    Unclassified(BoxError),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(" \"{}\"", r))
        .unwrap_or_default()
}

impl AppError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create an illegal argument error
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
            source: None,
        }
    }

    /// Create a type mismatch error for a named parameter
    pub fn type_mismatch(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            value: value.into(),
            source: None,
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violations(violations: Vec<ConstraintViolation>) -> Self {
        Self::Validation(ValidationError::ConstraintViolations(violations))
    }

    /// Create a validation error that carries only a message
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::Invalid(message.into()))
    }

    /// Create an error that answers with the given status
    pub fn status(status: StatusCode) -> Self {
        Self::ResponseStatus {
            status,
            reason: None,
        }
    }

    /// Create an error that answers with the given status and a reason
    pub fn status_with_reason(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::ResponseStatus {
            status,
            reason: Some(reason.into()),
        }
    }

    /// Wrap any other error
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Unclassified(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Unclassified(Box::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::IllegalArgument {
            message: format!("Invalid JSON: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.into())
    }
}

/// Decides whether the message of a [`ServiceError`] may be shown to the caller
#[derive(Clone, Copy, Default)]
pub enum ExposePolicy {
    /// Always expose the message
    Always,
    /// Never expose the message
    Never,
    /// Expose the message for 4xx statuses only
    #[default]
    ClientError,
    /// Decide per error
    Custom(fn(&ServiceError) -> bool),
}

impl ExposePolicy {
    fn test(&self, err: &ServiceError) -> bool {
        match self {
            ExposePolicy::Always => true,
            ExposePolicy::Never => false,
            ExposePolicy::ClientError => err.status.is_client_error(),
            ExposePolicy::Custom(predicate) => predicate(err),
        }
    }
}

impl fmt::Debug for ExposePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposePolicy::Always => f.write_str("Always"),
            ExposePolicy::Never => f.write_str("Never"),
            ExposePolicy::ClientError => f.write_str("ClientError"),
            ExposePolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A backend error with a status, an optional code and a correlation id
///
/// Every instance gets a random id at construction. The id ends up in the
/// problem body whether or not the message is exposed, so a generic client
/// facing error can be matched with the server log.
///
/// ```rust,ignore
/// let err = ServiceError::new("Car not found")
///     .with_status(StatusCode::NOT_FOUND)
///     .with_code("CAR-404");
/// ```
#[derive(Debug, Clone)]
pub struct ServiceError {
    status: StatusCode,
    code: Option<String>,
    id: Uuid,
    message: String,
    expose: ExposePolicy,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl ServiceError {
    /// Create a new service error with status `500 Internal Server Error`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: None,
            id: Uuid::new_v4(),
            message: message.into(),
            expose: ExposePolicy::default(),
            source: None,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the application error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Replace the generated correlation id
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set the exposure policy
    pub fn with_expose(mut self, expose: ExposePolicy) -> Self {
        self.expose = expose;
        self
    }

    /// Attach the underlying cause
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// The HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The application error code, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The correlation id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The message, exposed only when the policy allows
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check whether the message may be returned to the caller
    pub fn expose_details(&self) -> bool {
        self.expose.test(self)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

/// Failed validation
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// Field level violations
    #[error("{}", describe(.0))]
    ConstraintViolations(Vec<ConstraintViolation>),

    /// Validation failed without field level details
    #[error("{0}")]
    Invalid(String),
}

fn describe(violations: &[ConstraintViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ValidationError {
    /// Flatten nested validator errors into violations with dotted paths
    ///
    /// Nested structs give `parent.child`, list entries give `items[2].name`.
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations = Vec::new();
        collect_violations(&errors, "", &mut violations);
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::ConstraintViolations(violations)
    }
}

fn collect_violations(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut Vec<ConstraintViolation>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation failed for field '{}'", path));
                    out.push(ConstraintViolation::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_violations(nested, &path, out),
            ValidationErrorsKind::List(entries) => {
                for (index, nested) in entries {
                    collect_violations(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}
