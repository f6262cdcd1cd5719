//! Error types for Uncodie operations

use thiserror::Error;
use uuid::Uuid;

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} not found with id {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Query on {table} failed: {reason}")]
    QueryFailed { table: &'static str, reason: String },

    #[error("Insert into {table} failed: {reason}")]
    InsertFailed { table: &'static str, reason: String },

    #[error("Update of {table} row {id} failed: {reason}")]
    UpdateFailed {
        table: &'static str,
        id: Uuid,
        reason: String,
    },

    #[error("Row from {table} could not be decoded: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Agent framework errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command service is not configured")]
    NotConfigured,

    #[error("Command submission failed with status {status}: {message}")]
    SubmitFailed { status: u16, message: String },

    #[error("Command lookup for {command_id} failed: {message}")]
    LookupFailed { command_id: String, message: String },

    #[error("Command {command_id} returned an unexpected result: {reason}")]
    InvalidResult { command_id: String, reason: String },

    #[error("Command {command_id} did not complete (last status: {status})")]
    NotCompleted { command_id: String, status: String },

    #[error("Command {command_id} failed")]
    Failed { command_id: String },

    #[error("Invalid response from command service: {reason}")]
    InvalidResponse { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{entity} {id} does not belong to site {site_id}")]
    SiteMismatch {
        entity: &'static str,
        id: Uuid,
        site_id: Uuid,
    },
}

impl ValidationError {
    /// Field name this error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::RequiredFieldMissing { field }
            | ValidationError::InvalidValue { field, .. } => Some(field),
            ValidationError::SiteMismatch { .. } => None,
        }
    }
}

/// Outbound email delivery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Email delivery is not configured")]
    NotConfigured,

    #[error("Email has no recipients")]
    NoRecipients,

    #[error("Email provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Email transport failed: {reason}")]
    Transport { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Uncodie errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UncodieError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Uncodie operations.
pub type UncodieResult<T> = Result<T, UncodieError>;

/// Result type alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let err = UncodieError::from(StorageError::NotFound { entity: "Lead", id });
        let msg = err.to_string();
        assert!(msg.contains("Lead"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn test_validation_field() {
        let err = ValidationError::RequiredFieldMissing {
            field: "lead_id".to_string(),
        };
        assert_eq!(err.field(), Some("lead_id"));
    }

    #[test]
    fn test_command_error_conversion() {
        let err: UncodieError = CommandError::NotCompleted {
            command_id: "cmd-1".to_string(),
            status: "pending".to_string(),
        }
        .into();
        assert!(matches!(err, UncodieError::Command(_)));
        assert!(err.to_string().contains("cmd-1"));
    }
}
