//! # Error Handling for List Queries
//!
//! Every failure of the compile → execute → paginate pipeline is a [`QueryError`].
//! The variants follow how a caller should react to them:
//!
//! - `Validation` - the request itself is malformed (bad page/limit, bad filter
//!   JSON, nesting too deep, or a dropped condition under the strict policy)
//! - `InvalidQuery` - the request is well formed but references a field or
//!   relation the collection does not have
//! - `ExecutionTimeout` / `Cancelled` - transient, never retried internally
//! - `Engine` - the storage engine failed; details are logged, never sent
//!
//! ## Usage
//!
//! ```rust,ignore
//! async fn list_posts(
//!     State(paginator): State<Arc<Paginator<SeaOrmExecutor>>>,
//!     Query(query): Query<ListQuery>,
//! ) -> Result<PaginatedResult<JsonValue>, QueryError> {
//!     paginator.paginate("posts", &query, &PaginateOptions::default()).await
//! }
//! ```
//!
//! ## Logging
//!
//! Internal details are logged through `tracing` when the error is turned into
//! a response. Install a subscriber in your binary to see them:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt().with_target(false).compact().init();
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::validation::{ValidationError, ValidationErrors};

/// Error returned by query compilation and execution.
#[derive(Debug)]
pub enum QueryError {
    /// 422 Unprocessable Entity - malformed list request
    Validation {
        /// Field-level problems found while compiling the request
        errors: Vec<ValidationError>,
    },

    /// 400 Bad Request - unknown collection, field or relation
    InvalidQuery {
        /// User-facing error message
        message: String,
    },

    /// 504 Gateway Timeout - the execution round-trip took too long
    ExecutionTimeout {
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// 503 Service Unavailable - the request was cancelled before execution finished
    Cancelled,

    /// 500 Internal Server Error - storage failure (details logged, not exposed)
    Engine {
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },
}

impl QueryError {
    /// Create a validation error for a single field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![ValidationError::new(field, message)],
        }
    }

    /// Create a 400 error for a reference the collection does not know
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn execution_timeout(timeout: Duration) -> Self {
        Self::ExecutionTimeout { timeout }
    }

    /// Wrap a storage error
    #[must_use]
    pub fn engine(err: DbErr) -> Self {
        Self::Engine { internal: err }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            Self::ExecutionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors are caused by the request; everything else is transient or internal
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { errors } => {
                if errors.len() == 1 {
                    errors[0].to_string()
                } else {
                    let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
                    format!("Validation failed: {}", joined.join(", "))
                }
            }
            Self::InvalidQuery { message } => message.clone(),
            Self::ExecutionTimeout { .. } => "The query took too long to execute".to_string(),
            Self::Cancelled => "The request was cancelled".to_string(),
            Self::Engine { .. } => "A database error occurred".to_string(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Engine { internal } => {
                tracing::error!(error = ?internal, "Database error while executing list query");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "List query rejected"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::Validation { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.iter().map(ToString::to_string).collect()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine { internal } => Some(internal),
            _ => None,
        }
    }
}

/// All storage failures surface as `Engine`; nothing is swallowed.
impl From<DbErr> for QueryError {
    fn from(err: DbErr) -> Self {
        Self::engine(err)
    }
}

impl From<ValidationError> for QueryError {
    fn from(err: ValidationError) -> Self {
        Self::Validation { errors: vec![err] }
    }
}

impl From<ValidationErrors> for QueryError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation {
            errors: errors.into_errors(),
        }
    }
}
