//! Error Types for the Uncodie API
//!
//! Every failed request is answered with the same envelope:
//!
//! ```json
//! { "success": false, "error": { "code": "LEAD_NOT_FOUND", "message": "...", "details": {} } }
//! ```
//!
//! `ErrorCode` fixes the HTTP status. Workflow and store errors convert into
//! `ApiError` with `?`, so handlers never build status codes by hand.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use uncodie_core::{
    CommandError, ConfigError, DeliveryError, StorageError, UncodieError, ValidationError,
};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request body or field validation failed
    ValidationError,

    LeadNotFound,
    AssigneeNotFound,
    SiteNotFound,
    AgentNotFound,
    CommandNotFound,
    InstanceNotFound,

    /// Completion callback signature missing or wrong
    InvalidSignature,

    /// A command failed or returned an unusable result
    CommandFailed,

    /// A command was still in flight when the wait ended
    CommandNotCompleted,

    /// Anything else; the message stays generic
    SystemError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,

            ErrorCode::LeadNotFound
            | ErrorCode::AssigneeNotFound
            | ErrorCode::SiteNotFound
            | ErrorCode::AgentNotFound
            | ErrorCode::CommandNotFound
            | ErrorCode::InstanceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::InvalidSignature => StatusCode::UNAUTHORIZED,

            ErrorCode::CommandFailed
            | ErrorCode::CommandNotCompleted
            | ErrorCode::SystemError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "Request validation failed",
            ErrorCode::LeadNotFound => "Lead not found",
            ErrorCode::AssigneeNotFound => "Assignee not found",
            ErrorCode::SiteNotFound => "Site not found",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::CommandNotFound => "Command not found",
            ErrorCode::InstanceNotFound => "Instance not found",
            ErrorCode::InvalidSignature => "Invalid callback signature",
            ErrorCode::CommandFailed => "Command failed",
            ErrorCode::CommandNotCompleted => "Command did not complete in time",
            ErrorCode::SystemError => "Internal system error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error carried in the `error` member of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    pub code: ErrorCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,

    /// Short excerpt of the underlying failure. Only exposed by
    /// [`attach_debug_details`] in development.
    #[serde(skip)]
    pub debug: Option<String>,
}

/// Error envelope as written on the wire.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ApiError,
}

/// Longest debug excerpt we will ever attach.
const DEBUG_EXCERPT_CHARS: usize = 300;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            debug: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Validation failure listing the offending fields.
    pub fn validation(fields: Vec<FieldError>) -> Self {
        let message = match fields.as_slice() {
            [single] => format!("{}: {}", single.field, single.message),
            _ => ErrorCode::ValidationError.default_message().to_string(),
        };
        Self::new(ErrorCode::ValidationError, message).with_details(json!({ "fields": fields }))
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(code: ErrorCode, id: impl fmt::Display) -> Self {
        Self::new(code, format!("{} ({})", code.default_message(), id))
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSignature, message)
    }

    /// Generic system error; `cause` is kept only as the debug excerpt.
    pub fn system(cause: impl fmt::Display) -> Self {
        let mut err = Self::from_code(ErrorCode::SystemError);
        err.debug = Some(excerpt(&cause.to_string()));
        err
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(DEBUG_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Debug excerpt carried from an error response to [`attach_debug_details`].
#[derive(Debug, Clone)]
struct DebugExcerpt(String);

impl IntoResponse for ApiError {
    fn into_response(mut self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, debug = ?self.debug, "Request failed");
        }
        let debug = self.debug.take();
        let mut response = (
            status,
            Json(ErrorEnvelope {
                success: false,
                error: self,
            }),
        )
            .into_response();
        if let Some(debug) = debug {
            response.extensions_mut().insert(DebugExcerpt(debug));
        }
        response
    }
}

/// Response mapper installed in development: copies the debug excerpt of a
/// failed request into `error.details.debug`.
pub async fn attach_debug_details(response: Response) -> Response {
    let Some(DebugExcerpt(debug)) = response.extensions().get::<DebugExcerpt>().cloned() else {
        return response;
    };
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Could not buffer error body");
            return (parts.status, "").into_response();
        }
    };
    let mut envelope: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return Response::from_parts(parts, axum::body::Body::from(bytes)),
    };
    if let Some(error) = envelope.get_mut("error").and_then(|e| e.as_object_mut()) {
        let details = error.entry("details").or_insert_with(|| json!({}));
        if let Some(details) = details.as_object_mut() {
            details.insert("debug".to_string(), json!(debug));
        }
    }
    let body = envelope.to_string();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, axum::body::Body::from(body))
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => match entity {
                "Lead" => ApiError::not_found(ErrorCode::LeadNotFound, id),
                "Profile" | "Assignee" => ApiError::not_found(ErrorCode::AssigneeNotFound, id),
                "Site" => ApiError::not_found(ErrorCode::SiteNotFound, id),
                "Agent" => ApiError::not_found(ErrorCode::AgentNotFound, id),
                "RemoteInstance" => ApiError::not_found(ErrorCode::InstanceNotFound, id),
                other => ApiError::system(format!("{} {} not found", other, id)),
            },
            other => ApiError::system(other),
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Failed { ref command_id } => {
                ApiError::new(ErrorCode::CommandFailed, err.to_string())
                    .with_details(json!({ "command_id": command_id, "status": "failed" }))
            }
            CommandError::InvalidResult {
                ref command_id,
                ref reason,
            } => ApiError::new(ErrorCode::CommandFailed, err.to_string())
                .with_details(json!({ "command_id": command_id, "reason": reason })),
            CommandError::NotCompleted {
                ref command_id,
                ref status,
            } => ApiError::new(ErrorCode::CommandNotCompleted, err.to_string())
                .with_details(json!({ "command_id": command_id, "status": status })),
            other => ApiError::system(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::SiteMismatch { entity, .. } => {
                format!("{}_id", entity.to_ascii_lowercase())
            }
            other => other.field().unwrap_or("body").to_string(),
        };
        ApiError::invalid_field(field, err.to_string())
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        ApiError::system(err)
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::system(err)
    }
}

impl From<UncodieError> for ApiError {
    fn from(err: UncodieError) -> Self {
        match err {
            UncodieError::Storage(e) => e.into(),
            UncodieError::Command(e) => e.into(),
            UncodieError::Validation(e) => e.into(),
            UncodieError::Delivery(e) => e.into(),
            UncodieError::Config(e) => e.into(),
        }
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::system(err)
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);
        ApiError::system(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_field("body", format!("Invalid JSON: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_field("body", rejection.body_text())
    }
}

impl From<minijinja::Error> for ApiError {
    fn from(err: minijinja::Error) -> Self {
        ApiError::system(format!("Template rendering failed: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::LeadNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InstanceNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InvalidSignature.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::CommandNotCompleted.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::CommandNotCompleted).unwrap();
        assert_eq!(json, "\"COMMAND_NOT_COMPLETED\"");
    }

    #[test]
    fn test_not_found_mapping_by_entity() {
        let id = Uuid::nil();
        let cases = [
            ("Lead", ErrorCode::LeadNotFound),
            ("Profile", ErrorCode::AssigneeNotFound),
            ("Site", ErrorCode::SiteNotFound),
            ("Agent", ErrorCode::AgentNotFound),
            ("RemoteInstance", ErrorCode::InstanceNotFound),
        ];
        for (entity, code) in cases {
            let err = ApiError::from(StorageError::NotFound { entity, id });
            assert_eq!(err.code, code, "{}", entity);
        }
    }

    #[test]
    fn test_command_errors_carry_command_id() {
        let err = ApiError::from(CommandError::NotCompleted {
            command_id: "cmd_9".to_string(),
            status: "running".to_string(),
        });
        assert_eq!(err.code, ErrorCode::CommandNotCompleted);
        let details = err.details.unwrap();
        assert_eq!(details["command_id"], "cmd_9");
        assert_eq!(details["status"], "running");
    }

    #[test]
    fn test_system_error_hides_cause() {
        let err = ApiError::from(StorageError::Unavailable {
            reason: "connection refused on 10.0.0.4".to_string(),
        });
        assert_eq!(err.code, ErrorCode::SystemError);
        assert!(!err.message.contains("10.0.0.4"));
        assert!(err.debug.unwrap().contains("10.0.0.4"));

        let json = serde_json::to_value(ApiError::system("secret")).unwrap();
        assert!(json.get("debug").is_none());
    }

    #[test]
    fn test_validation_lists_fields() {
        let err = ApiError::validation(vec![
            FieldError::new("lead_id", "is required"),
            FieldError::new("brief", "is required"),
        ]);
        let fields = &err.details.unwrap()["fields"];
        assert_eq!(fields.as_array().unwrap().len(), 2);
        assert_eq!(fields[0]["field"], "lead_id");
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(DEBUG_EXCERPT_CHARS * 2);
        assert_eq!(excerpt(&long).chars().count(), DEBUG_EXCERPT_CHARS + 3);
        assert_eq!(excerpt("short"), "short");
    }
}
