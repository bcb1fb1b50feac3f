//! RFC 7807 problem details
//!
//! [`Problem`] is the body of every error response. [`translate`] decides
//! which problem an [`AppError`](crate::AppError) becomes.

mod model;
mod translate;

pub use model::{
    ConstraintViolation, Problem, MSG_VIOLATIONS, PROBLEM_JSON, TYPE_CONSTRAINT_VIOLATION,
    TYPE_PROBLEM, TYPE_TRACEABLE_PROBLEM,
};
pub use translate::{error_endpoint, translate, write_problem, LOG_TARGET};
