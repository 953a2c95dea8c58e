/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored record: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Identifier field present on every stored document
pub const ID_FIELD: &str = "id";

/// Internal version counter, bumped by every update and hidden from default projections
pub const VERSION_FIELD: &str = "__v";

/// Write operations a document goes through.
/// Validation runs every rule on Create and only the touched ones on Update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
}

/// Resolve a dotted path (`startLocation.address`) inside a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Field names accepted anywhere a caller can name a field.
/// Letters, digits, underscore and dots for nested paths; no leading digit, no `$`.
pub fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if name.ends_with('.') || name.contains("..") {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_follows_nested_objects() {
        let doc = json!({"startLocation": {"address": "Miami"}, "name": "x"});
        let doc = doc.as_object().unwrap();
        assert_eq!(lookup(doc, "startLocation.address"), Some(&json!("Miami")));
        assert_eq!(lookup(doc, "name.address"), None);
        assert_eq!(lookup(doc, "missing"), None);
    }

    #[test]
    fn field_names_reject_operators_and_punctuation() {
        assert!(is_valid_field_name("price"));
        assert!(is_valid_field_name("startLocation.address"));
        assert!(is_valid_field_name("_id"));
        assert!(!is_valid_field_name("$where"));
        assert!(!is_valid_field_name("price[gte]"));
        assert!(!is_valid_field_name("1abc"));
        assert!(!is_valid_field_name("a..b"));
        assert!(!is_valid_field_name(""));
    }
}
