//! Identity types and UUID validation

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;

/// Entity identifier. Rows in the store are keyed by UUID.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Check whether a string is a hyphenated UUID.
///
/// Only the canonical 36-character form is accepted; braced, simple and
/// URN forms that `Uuid::parse_str` would also take are rejected so that the
/// ids we echo back match what the store holds.
pub fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

/// Parse a UUID field, naming the field in the error.
pub fn parse_uuid(field: &str, value: &str) -> Result<EntityId, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    if !is_valid_uuid(trimmed) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be a valid UUID".to_string(),
        });
    }
    Uuid::try_parse(trimmed).map_err(|e| ValidationError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an optional UUID field. Empty strings count as absent.
pub fn parse_optional_uuid(
    field: &str,
    value: Option<&str>,
) -> Result<Option<EntityId>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_uuid(field, v).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_uuid() {
        assert!(is_valid_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid(""));
    }

    #[test]
    fn test_parse_uuid_names_field() {
        let err = parse_uuid("lead_id", "nope").unwrap_err();
        assert!(err.to_string().contains("lead_id"));

        let err = parse_uuid("lead_id", "   ").unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn test_parse_optional_uuid() {
        assert_eq!(parse_optional_uuid("segment_id", None).unwrap(), None);
        assert_eq!(parse_optional_uuid("segment_id", Some("")).unwrap(), None);
        assert!(parse_optional_uuid("segment_id", Some("x")).is_err());
    }

    proptest! {
        #[test]
        fn prop_generated_uuids_are_valid(bytes in any::<[u8; 16]>()) {
            let id = Uuid::from_bytes(bytes);
            prop_assert!(is_valid_uuid(&id.to_string()));
            prop_assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
        }
    }
}
