//! Request Validation
//!
//! Request bodies arrive with loosely typed fields (`Option<String>` ids,
//! optional numbers). [`FieldErrors`] checks them one by one and reports
//! every problem at once as a single `VALIDATION_ERROR`.

use uncodie_core::{parse_optional_uuid, parse_uuid, EntityId, ValidationError};

use crate::error::{ApiError, ApiResult, FieldError};

/// Accumulates field-level failures while a request is parsed.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, err: ValidationError) {
        let field = match &err {
            ValidationError::SiteMismatch { entity, .. } => format!("{}_id", entity.to_ascii_lowercase()),
            other => other.field().unwrap_or("body").to_string(),
        };
        let message = match err {
            ValidationError::RequiredFieldMissing { .. } => "is required".to_string(),
            ValidationError::InvalidValue { reason, .. } => reason,
            other => other.to_string(),
        };
        self.errors.push(FieldError::new(field, message));
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Required UUID. Missing, blank and malformed values are all errors.
    pub fn require_uuid(&mut self, field: &str, value: Option<&str>) -> Option<EntityId> {
        match value {
            None => {
                self.push(ValidationError::RequiredFieldMissing {
                    field: field.to_string(),
                });
                None
            }
            Some(raw) => parse_uuid(field, raw).map_err(|e| self.push(e)).ok(),
        }
    }

    /// Optional UUID; blank counts as absent.
    pub fn optional_uuid(&mut self, field: &str, value: Option<&str>) -> Option<EntityId> {
        parse_optional_uuid(field, value)
            .map_err(|e| self.push(e))
            .ok()
            .flatten()
    }

    /// Required non-blank text, returned trimmed.
    pub fn require_text(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v.to_string()),
            None => {
                self.push(ValidationError::RequiredFieldMissing {
                    field: field.to_string(),
                });
                None
            }
        }
    }

    /// Optional integer within `min..=max`, `default` when absent.
    pub fn bounded(&mut self, field: &str, value: Option<i64>, min: i64, max: i64, default: i64) -> i64 {
        match value {
            None => default,
            Some(v) if (min..=max).contains(&v) => v,
            Some(_) => {
                self.add(field, format!("must be between {} and {}", min, max));
                default
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(value)` if nothing failed, otherwise the collected errors.
    pub fn finish<T>(self, value: impl FnOnce() -> Option<T>) -> ApiResult<T> {
        if !self.errors.is_empty() {
            return Err(ApiError::validation(self.errors));
        }
        value().ok_or_else(|| ApiError::invalid_field("body", "incomplete request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    #[test]
    fn test_collects_every_field() {
        let mut errors = FieldErrors::new();
        let lead = errors.require_uuid("lead_id", None);
        let site = errors.require_uuid("site_id", Some("nope"));
        let brief = errors.require_text("brief", Some("   "));
        assert!(lead.is_none() && site.is_none() && brief.is_none());

        let err = errors.finish(|| Some(())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        let fields = err.details.unwrap()["fields"].as_array().unwrap().clone();
        let names: Vec<&str> = fields.iter().filter_map(|f| f["field"].as_str()).collect();
        assert_eq!(names, vec!["lead_id", "site_id", "brief"]);
    }

    #[test]
    fn test_optional_uuid_blank_is_absent() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.optional_uuid("agent_id", Some("")), None);
        assert_eq!(errors.optional_uuid("agent_id", None), None);
        assert!(errors.is_empty());

        errors.optional_uuid("agent_id", Some("123"));
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_bounded_defaults_and_rejects() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.bounded("max_leads", None, 1, 50, 10), 10);
        assert_eq!(errors.bounded("max_leads", Some(50), 1, 50, 10), 50);
        assert!(errors.is_empty());
        errors.bounded("max_leads", Some(51), 1, 50, 10);
        assert!(!errors.is_empty());
    }

    proptest! {
        #[test]
        fn prop_bounded_never_leaves_range(value in proptest::option::of(any::<i64>())) {
            let mut errors = FieldErrors::new();
            let out = errors.bounded("limit", value, 1, 100, 25);
            prop_assert!((1..=100).contains(&out));
            prop_assert_eq!(errors.is_empty(), value.map_or(true, |v| (1..=100).contains(&v)));
        }
    }
}
