//! # Normalizer
//!
//! Idempotent cleanup of inbound values: trims and collapses whitespace in
//! every string leaf, lower-cases fields with an "email" semantic role, and
//! strips non-digits from fields with a "phone" semantic role. Key order is
//! not preserved deliberately; it is treated as insignificant downstream.

use std::collections::BTreeSet;

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct NormalizerConfig {
    /// Dotted paths (e.g. "email", "contact.email") treated as emails.
    pub email_fields: BTreeSet<String>,
    /// Dotted paths treated as phone numbers.
    pub phone_fields: BTreeSet<String>,
}

impl NormalizerConfig {
    pub fn normalize(&self, doc: &Value) -> Value {
        self.normalize_at(doc, "")
    }

    fn normalize_at(&self, value: &Value, path: &str) -> Value {
        match value {
            Value::Object(map) => {
                let mut normalized = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    normalized.insert(key.clone(), self.normalize_at(child, &child_path));
                }
                Value::Object(normalized)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.normalize_at(item, path))
                    .collect(),
            ),
            Value::String(s) => {
                let cleaned = collapse_whitespace(s.trim());
                if self.email_fields.contains(path) {
                    Value::String(cleaned.to_lowercase())
                } else if self.phone_fields.contains(path) {
                    Value::String(digits_only(&cleaned))
                } else {
                    Value::String(cleaned)
                }
            }
            // Booleans, numbers, and null pass through unchanged.
            other => other.clone(),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NormalizerConfig {
        NormalizerConfig {
            email_fields: ["email".to_string()].into_iter().collect(),
            phone_fields: ["phone".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn trims_and_collapses_whitespace() {
        let doc = json!({"name": "  John   Smith  "});
        let normalized = config().normalize(&doc);
        assert_eq!(normalized["name"], json!("John Smith"));
    }

    #[test]
    fn lower_cases_email_fields() {
        let doc = json!({"email": "  A@B.COM "});
        let normalized = config().normalize(&doc);
        assert_eq!(normalized["email"], json!("a@b.com"));
    }

    #[test]
    fn extracts_digits_from_phone_fields() {
        let doc = json!({"phone": "+49 (123) 456-78 ext. 9"});
        let normalized = config().normalize(&doc);
        assert_eq!(normalized["phone"], json!("49123456789"));
    }

    #[test]
    fn leaves_non_string_leaves_untouched() {
        let doc = json!({"active": true, "count": 3, "missing": null});
        let normalized = config().normalize(&doc);
        assert_eq!(normalized, doc);
    }

    #[test]
    fn is_idempotent_over_arbitrary_documents() {
        let cfg = config();
        let docs = [
            json!({"email": " A@B.com ", "phone": "1 (23) 45", "nested": {"x": "  y  z "}}),
            json!([{"a": " b "}, {"c": null}]),
            json!("just a string"),
            json!(null),
        ];

        for doc in docs {
            let once = cfg.normalize(&doc);
            let twice = cfg.normalize(&once);
            assert_eq!(once, twice, "normalize should be idempotent for {doc:?}");
        }
    }
}
