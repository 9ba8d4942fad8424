//! # Validator
//!
//! Stateless, pure screening of a raw lead payload against business rules.
//! Rules run in a fixed order (geographic gate, then homeowner gate, then
//! required fields); the first failure determines the rejection code.

use regex::Regex;
use serde_json::Value;

use crate::jsonpath::lookup;
use crate::model::RejectionCode;

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Dotted path to the postal code field, e.g. "zipcode".
    pub postal_code_field: String,
    /// Anchored pattern the postal code must match in full, e.g. `^66\d{3}$`.
    pub postal_code_pattern: Regex,
    pub postal_code_rejection_code: RejectionCode,
    /// Dotted path to the homeowner boolean field, e.g. "house.is_owner".
    pub ownership_field: String,
    pub ownership_rejection_code: RejectionCode,
    /// Dotted paths to other scalar fields that must be present.
    pub required_fields: Vec<String>,
    pub missing_field_rejection_code: RejectionCode,
}

impl ValidatorConfig {
    pub fn validate(&self, raw: &Value) -> Result<(), RejectionCode> {
        self.check_postal_code(raw)?;
        self.check_ownership(raw)?;
        self.check_required_fields(raw)?;
        Ok(())
    }

    fn check_postal_code(&self, raw: &Value) -> Result<(), RejectionCode> {
        match lookup(raw, &self.postal_code_field) {
            Some(Value::String(s)) if self.postal_code_pattern.is_match(s) => Ok(()),
            _ => Err(self.postal_code_rejection_code.clone()),
        }
    }

    fn check_ownership(&self, raw: &Value) -> Result<(), RejectionCode> {
        match lookup(raw, &self.ownership_field) {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(self.ownership_rejection_code.clone()),
        }
    }

    fn check_required_fields(&self, raw: &Value) -> Result<(), RejectionCode> {
        for field in &self.required_fields {
            match lookup(raw, field) {
                Some(Value::Null) | None => {
                    return Err(self.missing_field_rejection_code.clone())
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ValidatorConfig {
        ValidatorConfig {
            postal_code_field: "zipcode".to_string(),
            postal_code_pattern: Regex::new(r"^66\d{3}$").unwrap(),
            postal_code_rejection_code: "ZIPCODE_INVALID".to_string(),
            ownership_field: "house.is_owner".to_string(),
            ownership_rejection_code: "NOT_HOMEOWNER".to_string(),
            required_fields: vec!["phone".to_string()],
            missing_field_rejection_code: "MISSING_REQUIRED_FIELD".to_string(),
        }
    }

    #[test]
    fn passes_a_fully_valid_payload() {
        let doc = json!({
            "zipcode": "66123",
            "house": {"is_owner": true},
            "phone": "+49 123 456",
        });
        assert!(config().validate(&doc).is_ok());
    }

    #[test]
    fn rejects_every_non_matching_postal_code() {
        let cfg = config();
        for zipcode in [json!("12345"), json!(66123), json!(null), Value::Null] {
            let doc = json!({"zipcode": zipcode, "house": {"is_owner": true}, "phone": "x"});
            assert_eq!(cfg.validate(&doc), Err("ZIPCODE_INVALID".to_string()));
        }
    }

    #[test]
    fn rejects_missing_postal_code() {
        let doc = json!({"house": {"is_owner": true}, "phone": "x"});
        assert_eq!(config().validate(&doc), Err("ZIPCODE_INVALID".to_string()));
    }

    #[test]
    fn rejects_every_non_true_ownership_value() {
        let cfg = config();
        for is_owner in [json!(false), json!("true"), json!(null)] {
            let doc = json!({"zipcode": "66123", "house": {"is_owner": is_owner}, "phone": "x"});
            assert_eq!(cfg.validate(&doc), Err("NOT_HOMEOWNER".to_string()));
        }
    }

    #[test]
    fn rejects_missing_ownership_field() {
        let doc = json!({"zipcode": "66123", "phone": "x"});
        assert_eq!(config().validate(&doc), Err("NOT_HOMEOWNER".to_string()));
    }

    #[test]
    fn rejects_missing_required_field_only_after_earlier_gates_pass() {
        let doc = json!({"zipcode": "66123", "house": {"is_owner": true}});
        assert_eq!(
            config().validate(&doc),
            Err("MISSING_REQUIRED_FIELD".to_string())
        );
    }

    #[test]
    fn fail_fast_ordering_surfaces_postal_code_before_ownership() {
        let doc = json!({"zipcode": "00000", "house": {"is_owner": false}});
        assert_eq!(config().validate(&doc), Err("ZIPCODE_INVALID".to_string()));
    }
}
