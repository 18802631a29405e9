//! # Error Handling
//!
//! This module provides unified error handling for the attendance API,
//! rendering every failure as the same JSON envelope with trace ID propagation:
//!
//! ```json
//! {"status":"error","error_type":"ValidationError","message":"...",
//!  "details":[{"field":"port","error":"..."}],"trace_id":"..."}
//! ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::access::Denial;
use crate::services::ServiceError;
use crate::telemetry;
use crate::validation::{FieldError, NON_FIELD_ERRORS, ValidationErrors};

/// Unified API error response structure
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error category for programmatic handling
    pub error_type: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Per-field problems (empty for non-validation errors)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    status: &'static str,
    #[serde(flatten)]
    error: &'a ApiError,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, error_type: S, message: S) -> Self {
        Self {
            status,
            error_type: error_type.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: Vec::new(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add field details to the error
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = details;
        self
    }

    /// Current request trace ID; outside a request a short correlation ID is generated.
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]).into_boxed_str())
            })
    }
}

pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Invalid input.")]
    ValidationError,
    #[error("Authentication credentials were not provided or are invalid.")]
    AuthenticationFailed,
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("Not found.")]
    NotFound,
    #[error("Method not allowed.")]
    MethodNotAllowed,
    #[error("An unexpected error occurred.")]
    ServerError,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::ValidationError => StatusCode::BAD_REQUEST,
            ErrorType::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ErrorType::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorType::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the `error_type` string rendered in the envelope
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::ValidationError => "ValidationError",
            ErrorType::AuthenticationFailed => "AuthenticationFailed",
            ErrorType::PermissionDenied => "PermissionDenied",
            ErrorType::NotFound => "NotFound",
            ErrorType::MethodNotAllowed => "MethodNotAllowed",
            ErrorType::ServerError => "ServerError",
        }
    }

    fn with_message(&self, message: &str) -> ApiError {
        ApiError::new(self.status_code(), self.error_code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = ErrorEnvelope {
            status: "error",
            error: &self,
        };
        (status, axum::Json(body)).into_response()
    }
}

// Error mappers for common sources

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        error_type.with_message(&error_type.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        ErrorType::ServerError.into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        ErrorType::ValidationError.with_message(&message)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        validation_error("Invalid input.", errors.into_vec())
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return validation_error(
                "Invalid input.",
                vec![FieldError {
                    field: NON_FIELD_ERRORS.to_string(),
                    error: "A record with these values already exists.".to_string(),
                }],
            );
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                ErrorType::NotFound.with_message(&format!("Record not found: {}", record))
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                ErrorType::ServerError.with_message("A database error occurred.")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(errors) => errors.into(),
            ServiceError::PermissionDenied(message) => forbidden(Some(&message)),
            ServiceError::NotFound(what) => {
                ErrorType::NotFound.with_message(&format!("{what} not found."))
            }
            ServiceError::Unauthorized(message) => unauthorized(Some(&message)),
            ServiceError::Store(db_err) => db_err.into(),
            ServiceError::Internal(err) => err.into(),
        }
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::UnsupportedMethod(_) => {
                ErrorType::MethodNotAllowed.with_message(&denial.to_string())
            }
            Denial::MissingCapability(_) => forbidden(None),
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication credentials were not provided.");
    ErrorType::AuthenticationFailed.with_message(msg)
}

/// Create a forbidden error (403)
pub fn forbidden(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("You do not have permission to perform this action.");
    ErrorType::PermissionDenied.with_message(msg)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: Vec<FieldError>) -> ApiError {
    ErrorType::ValidationError
        .with_message(message)
        .with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "ValidationError", "Test error message");

        assert_eq!(error.error_type, Box::from("ValidationError"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert!(error.details.is_empty());
    }

    #[test]
    fn test_error_type_mapping() {
        let not_found_error: ApiError = ErrorType::NotFound.into();
        assert_eq!(not_found_error.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found_error.error_type, Box::from("NotFound"));

        let denied: ApiError = ErrorType::PermissionDenied.into();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.error_type, Box::from("PermissionDenied"));
    }

    #[test]
    fn test_from_anyhow() {
        let api_error: ApiError = anyhow::anyhow!("Something went wrong").into();

        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.error_type, Box::from("ServerError"));
        assert!(!api_error.message.contains("Something went wrong"));
    }

    #[test]
    fn test_database_error_mapping() {
        let api_error: ApiError = sea_orm::DbErr::RecordNotFound("employee".to_string()).into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert!(api_error.message.contains("employee"));

        let api_error: ApiError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.error_type, Box::from("ServerError"));
    }

    #[test]
    fn test_service_error_mapping() {
        let api_error: ApiError =
            ServiceError::Validation(ValidationErrors::single("port", "bad")).into();
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.details.len(), 1);
        assert_eq!(api_error.details[0].field, "port");

        let api_error: ApiError = ServiceError::PermissionDenied("nope".into()).into();
        assert_eq!(api_error.status, StatusCode::FORBIDDEN);
        assert_eq!(api_error.message, Box::from("nope"));

        let api_error: ApiError = ServiceError::NotFound("Device").into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.message, Box::from("Device not found."));

        let api_error: ApiError = ServiceError::Unauthorized("expired".into()).into();
        assert_eq!(api_error.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_denial_mapping() {
        use crate::access::{Action, Capability, EntityKind};

        let api_error: ApiError = Denial::MissingCapability(Capability::new(
            EntityKind::Device,
            Action::Delete,
        ))
        .into();
        assert_eq!(api_error.status, StatusCode::FORBIDDEN);
        assert_eq!(
            api_error.message,
            Box::from("You do not have permission to perform this action.")
        );

        let api_error: ApiError = Denial::UnsupportedMethod(axum::http::Method::TRACE).into();
        assert_eq!(api_error.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(api_error.message, Box::from("Method \"TRACE\" not allowed."));
    }

    #[test]
    fn test_trace_id_generation() {
        let error: ApiError = ErrorType::ServerError.into();

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let error = validation_error(
            "Invalid input.",
            vec![FieldError {
                field: "contact_number".into(),
                error: "Contact number must be between 10 and 15 digits.".into(),
            }],
        );

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_type"], "ValidationError");
        assert_eq!(body["message"], "Invalid input.");
        assert_eq!(
            body["details"],
            json!([{
                "field": "contact_number",
                "error": "Contact number must be between 10 and 15 digits."
            }])
        );
        assert!(body["trace_id"].is_string());
    }

    #[tokio::test]
    async fn test_envelope_omits_empty_details() {
        let body = body_json(forbidden(None).into_response()).await;
        assert_eq!(body["error_type"], "PermissionDenied");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_trace_id_taken_from_request_context() {
        let error = telemetry::with_trace_context(
            telemetry::TraceContext {
                trace_id: "req-1".to_string(),
            },
            async { ApiError::from(ErrorType::NotFound) },
        )
        .await;

        assert_eq!(error.trace_id.as_deref(), Some("req-1"));
    }
}
