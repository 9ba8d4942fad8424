//! Tiny dotted-path lookup shared by the validator and the mapper.

use serde_json::Value;

/// Looks up a dotted path (`"house.is_owner"`) in a JSON document, returning
/// `None` if any segment is missing or the traversal hits a non-object.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_nested_values() {
        let doc = json!({"house": {"is_owner": true}});
        assert_eq!(lookup(&doc, "house.is_owner"), Some(&json!(true)));
    }

    #[test]
    fn returns_none_for_missing_or_non_object_segments() {
        let doc = json!({"house": "not an object"});
        assert_eq!(lookup(&doc, "house.is_owner"), None);
        assert_eq!(lookup(&doc, "missing"), None);
    }
}
