//! # Mapper
//!
//! Produces the downstream customer payload under a permissive attribute
//! policy: an optional attribute that fails its configured type check is
//! dropped rather than failing the whole lead, since upstream lead sources
//! drift and a stale dropdown option is not worth losing the lead over. A
//! required attribute failing its check, or the core phone field being
//! absent, does fail the mapping — the downstream call would be meaningless
//! without it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::jsonpath::lookup;

#[derive(Debug, Clone)]
pub enum AttributeKind {
    Text,
    Dropdown { options: Vec<String> },
    Range { min: Option<f64>, max: Option<f64> },
}

#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub kind: AttributeKind,
    pub required: bool,
}

#[derive(Error, Debug)]
pub enum AttributeConfigError {
    #[error("attribute definitions document must be a JSON object")]
    NotAnObject,
    #[error("attribute \"{0}\" is missing its \"type\" field")]
    MissingType(String),
    #[error("attribute \"{0}\" has unknown type \"{1}\" (expected text, dropdown, or range)")]
    UnknownType(String, String),
    #[error("dropdown attribute \"{0}\" is missing its \"options\" array")]
    MissingOptions(String),
}

/// Parse the attribute-validation document described in the configuration
/// surface: a map from attribute key to `{type, required, ...}`. Unknown or
/// malformed attribute keys fail the whole load rather than being silently
/// ignored — the permissive-drop policy applies to *lead values* at mapping
/// time, not to operator-authored configuration.
pub fn load_attribute_definitions(
    doc: &Value,
) -> Result<BTreeMap<String, AttributeDef>, AttributeConfigError> {
    let object = doc.as_object().ok_or(AttributeConfigError::NotAnObject)?;

    let mut attributes = BTreeMap::new();
    for (key, def) in object {
        let required = def
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let kind_str = def
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AttributeConfigError::MissingType(key.clone()))?;

        let kind = match kind_str {
            "text" => AttributeKind::Text,
            "dropdown" => {
                let options = def
                    .get("options")
                    .and_then(Value::as_array)
                    .ok_or_else(|| AttributeConfigError::MissingOptions(key.clone()))?
                    .iter()
                    .filter_map(|o| o.as_str().map(str::to_owned))
                    .collect();
                AttributeKind::Dropdown { options }
            }
            "range" => AttributeKind::Range {
                min: def.get("min").and_then(Value::as_f64),
                max: def.get("max").and_then(Value::as_f64),
            },
            other => {
                return Err(AttributeConfigError::UnknownType(
                    key.clone(),
                    other.to_owned(),
                ))
            }
        };

        attributes.insert(key.clone(), AttributeDef { kind, required });
    }

    Ok(attributes)
}

#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Dotted path to the contact phone in the normalized document.
    pub phone_field: String,
    /// Injected into every successful mapping; never read from the input.
    pub product_name: String,
    /// Attribute key (top-level field of the normalized document) to its
    /// validation definition.
    pub attributes: BTreeMap<String, AttributeDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOutcome {
    pub customer_payload: Value,
    pub omitted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingError {
    pub reasons: Vec<String>,
}

impl MapperConfig {
    pub fn map(&self, normalized: &Value) -> Result<MapOutcome, MappingError> {
        let mut reasons = Vec::new();
        let mut omitted = Vec::new();

        let phone = match lookup(normalized, &self.phone_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => {
                return Err(MappingError {
                    reasons: vec![format!("{} is required and must be non-empty", self.phone_field)],
                })
            }
        };

        let mut customer_payload = Map::new();
        customer_payload.insert("phone".to_string(), Value::String(phone));

        let mut product = Map::new();
        product.insert("name".to_string(), Value::String(self.product_name.clone()));
        customer_payload.insert("product".to_string(), Value::Object(product));

        let phone_top_level = self.phone_field.split('.').next().unwrap_or(&self.phone_field);

        if let Value::Object(fields) = normalized {
            for (key, value) in fields {
                if key == phone_top_level {
                    continue;
                }

                match self.attributes.get(key) {
                    Some(def) => match validate_attribute(&def.kind, value) {
                        Ok(valid_value) => {
                            customer_payload.insert(key.clone(), valid_value);
                        }
                        Err(_) if def.required => {
                            reasons.push(format!("{key} failed its required type check"));
                        }
                        Err(_) => {
                            omitted.push(key.clone());
                        }
                    },
                    None => {
                        customer_payload.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        if !reasons.is_empty() {
            return Err(MappingError { reasons });
        }

        Ok(MapOutcome {
            customer_payload: Value::Object(customer_payload),
            omitted,
        })
    }
}

/// Validate `value` against `kind`, returning the (possibly coerced) value to
/// store on success.
fn validate_attribute(kind: &AttributeKind, value: &Value) -> Result<Value, ()> {
    match kind {
        AttributeKind::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(Value::String(s.clone())),
            _ => Err(()),
        },
        AttributeKind::Dropdown { options } => match value {
            Value::String(s) if options.iter().any(|o| o == s) => Ok(Value::String(s.clone())),
            _ => Err(()),
        },
        AttributeKind::Range { min, max } => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };

            match number {
                Some(n) if min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m) => {
                    Ok(value.clone())
                }
                _ => Err(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> MapperConfig {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "roof_type".to_string(),
            AttributeDef {
                kind: AttributeKind::Dropdown {
                    options: vec!["shingle".to_string(), "metal".to_string()],
                },
                required: false,
            },
        );
        attributes.insert(
            "square_footage".to_string(),
            AttributeDef {
                kind: AttributeKind::Range {
                    min: Some(0.0),
                    max: Some(10_000.0),
                },
                required: true,
            },
        );

        MapperConfig {
            phone_field: "phone".to_string(),
            product_name: "solar-install".to_string(),
            attributes,
        }
    }

    #[test]
    fn injects_product_name_from_configuration_not_input() {
        let doc = json!({"phone": "49123456789", "product": {"name": "spoofed"}});
        let outcome = config().map(&doc).unwrap();
        assert_eq!(outcome.customer_payload["product"]["name"], json!("solar-install"));
    }

    #[test]
    fn fails_without_a_non_empty_phone() {
        for doc in [json!({}), json!({"phone": ""}), json!({"phone": "   "})] {
            assert!(config().map(&doc).is_err());
        }
    }

    #[test]
    fn drops_optional_attribute_that_fails_its_type_check_and_still_succeeds() {
        let doc = json!({"phone": "49123456789", "roof_type": "unlisted_label", "square_footage": 1200});
        let outcome = config().map(&doc).unwrap();
        assert!(outcome.customer_payload.get("roof_type").is_none());
        assert_eq!(outcome.omitted, vec!["roof_type".to_string()]);
    }

    #[test]
    fn fails_when_a_required_attribute_fails_its_type_check() {
        let doc = json!({"phone": "49123456789", "square_footage": "not-a-number"});
        let err = config().map(&doc).unwrap_err();
        assert!(err.reasons.iter().any(|r| r.contains("square_footage")));
    }

    #[test]
    fn passes_through_unconfigured_attributes_unchanged() {
        let doc = json!({"phone": "49123456789", "square_footage": 500, "favorite_color": "blue"});
        let outcome = config().map(&doc).unwrap();
        assert_eq!(outcome.customer_payload["favorite_color"], json!("blue"));
    }

    #[test]
    fn loads_attribute_definitions_from_the_configured_document_shape() {
        let doc = json!({
            "roof_type": {"type": "dropdown", "required": false, "options": ["shingle", "metal"]},
            "square_footage": {"type": "range", "required": true, "min": 0, "max": 10000},
            "notes": {"type": "text", "required": false},
        });

        let attributes = load_attribute_definitions(&doc).expect("should parse");
        assert_eq!(attributes.len(), 3);
        assert!(matches!(
            attributes["roof_type"].kind,
            AttributeKind::Dropdown { .. }
        ));
        assert!(attributes["square_footage"].required);
        assert!(!attributes["notes"].required);
    }

    #[test]
    fn rejects_a_dropdown_definition_missing_its_options() {
        let doc = json!({"roof_type": {"type": "dropdown", "required": false}});
        assert!(matches!(
            load_attribute_definitions(&doc),
            Err(AttributeConfigError::MissingOptions(_))
        ));
    }

    #[test]
    fn rejects_an_unknown_attribute_type() {
        let doc = json!({"roof_type": {"type": "checkbox", "required": false}});
        assert!(matches!(
            load_attribute_definitions(&doc),
            Err(AttributeConfigError::UnknownType(_, _))
        ));
    }

    #[test]
    fn dotted_phone_field_is_not_duplicated_under_its_top_level_key() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "notes".to_string(),
            AttributeDef {
                kind: AttributeKind::Text,
                required: false,
            },
        );
        let cfg = MapperConfig {
            phone_field: "contact.phone".to_string(),
            product_name: "x".to_string(),
            attributes,
        };
        let doc = json!({"contact": {"phone": "49123456789"}, "notes": "hello"});
        let outcome = cfg.map(&doc).unwrap();
        assert_eq!(outcome.customer_payload["phone"], json!("49123456789"));
        assert!(outcome.customer_payload.get("contact").is_none());
    }

    #[test]
    fn range_accepts_open_bounds() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "budget".to_string(),
            AttributeDef {
                kind: AttributeKind::Range { min: Some(0.0), max: None },
                required: false,
            },
        );
        let cfg = MapperConfig {
            phone_field: "phone".to_string(),
            product_name: "x".to_string(),
            attributes,
        };
        let doc = json!({"phone": "1", "budget": 1_000_000});
        let outcome = cfg.map(&doc).unwrap();
        assert_eq!(outcome.customer_payload["budget"], json!(1_000_000));
    }
}
