use crate::response::Response;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::io;
use uuid::Uuid;

/// Media type of a serialized [`Problem`]
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Type of a problem that needs no further explanation than its status
pub const TYPE_PROBLEM: &str = "about:blank";

/// Type of a problem whose `violations` list the fields that failed validation
pub const TYPE_CONSTRAINT_VIOLATION: &str = "https://svckit.dev/problem/constraint-violation";

/// Type of a problem raised by a [`ServiceError`](crate::ServiceError), which
/// carries a correlation id and possibly an application code
pub const TYPE_TRACEABLE_PROBLEM: &str = "https://svckit.dev/problem/traceable-problem";

/// Detail of every constraint violation problem
pub const MSG_VIOLATIONS: &str = "Validation failed, see violations property for more details";

/// An error response body in the shape of RFC 7807 problem details
///
/// Optional members are left out of the JSON when unset. `violations` is
/// always written, as an empty array when there are none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// URI identifying the kind of problem
    #[serde(rename = "type")]
    pub problem_type: String,
    /// HTTP status code
    pub status: u16,
    /// Reason phrase of the status
    pub title: String,
    /// Explanation safe to show to the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Path of the failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Correlation id, also found in the server log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Application error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Failed field constraints, empty when not a validation problem
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
}

impl Problem {
    /// Create a generic problem for a status, titled with its reason phrase
    pub fn new(status: StatusCode) -> Self {
        Self {
            problem_type: TYPE_PROBLEM.to_string(),
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or("Unknown").to_string(),
            detail: None,
            instance: None,
            id: None,
            code: None,
            violations: Vec::new(),
        }
    }

    /// Set the problem type URI
    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }

    /// Replace the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the instance path
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set the correlation id
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the application error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the constraint violations
    pub fn with_violations(mut self, violations: Vec<ConstraintViolation>) -> Self {
        self.violations = violations;
        self
    }

    /// The status as a `StatusCode`
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Set status and content type on the response and write this problem as its body
    pub fn write_to(&self, res: &mut Response) -> io::Result<()> {
        let body = serde_json::to_vec(self)?;
        res.set_status(self.status_code());
        res.write_body(PROBLEM_JSON, &body)
    }
}

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    /// Dotted path of the property, e.g. `car.licensePlate`
    pub field: String,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
