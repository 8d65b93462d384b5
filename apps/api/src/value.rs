//! Value normalization and header-name casing.
//!
//! Spreadsheet cells come back as strings; snapshot rows hold typed JSON.
//! Everything is normalized to the same shape before comparison so that
//! `"TRUE"` vs `true`, `""` vs `null`, and JSON-as-string vs parsed object
//! never register as changes.

use serde_json::Value;

/// Normalizes a raw field value for comparison.
///
/// Strings are trimmed; `"TRUE"`/`"FALSE"` (any case) become booleans; the
/// empty string becomes null; strings that parse as a JSON object or array
/// become the parsed value. Already-typed values pass through untouched, so
/// the function is idempotent.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            if trimmed.eq_ignore_ascii_case("true") {
                return Value::Bool(true);
            }
            if trimmed.eq_ignore_ascii_case("false") {
                return Value::Bool(false);
            }
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    if parsed.is_object() || parsed.is_array() {
                        return parsed;
                    }
                }
            }
            Value::String(trimmed.to_string())
        }
        other => other.clone(),
    }
}

/// Stringified form used for the equality decision.
/// Objects and arrays serialize to JSON (serde_json orders object keys, so
/// two structurally equal objects always produce the same string); null is
/// the empty string; scalars stringify plainly.
pub fn compare_key(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Whether two raw values are semantically equal after normalization.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_key(&normalize(a)) == compare_key(&normalize(b))
}

/// Renders a value as a spreadsheet cell.
pub fn to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Converts a camelCase or snake_case API field name into the Title Case
/// header used in exported sheets: `htmlTitle` -> `Html Title`.
pub fn to_title_case(api_name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in api_name.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(current.clone());
                current.clear();
            }
        } else if ch.is_ascii_uppercase() && !current.is_empty() {
            words.push(current.clone());
            current.clear();
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts a snake_case database column name to the camelCase form used by
/// the HubSpot API: `html_title` -> `htmlTitle`.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Converts a camelCase field name to its snake_case database column:
/// `htmlTitle` -> `html_title`.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Maps any incoming field-name convention (Title Case sheet header,
/// snake_case column, camelCase API name) onto the canonical camelCase form
/// records are compared under.
pub fn canonical_field(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.contains(' ') {
        let snake = trimmed
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_");
        snake_to_camel(&snake)
    } else if trimmed.contains('_') {
        snake_to_camel(trimmed)
    } else {
        // Single-word headers arrive as "Name"/"Id"; camelCase API names
        // always start lowercase.
        let mut chars = trimmed.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

const ID_KEYS: [&str; 4] = ["id", "ID", "Id", "hubspot_page_id"];

/// Pulls the stable identifier out of a record, whichever casing convention
/// the source used. Returns the stringified form used as the lookup key.
pub fn record_id(record: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ID_KEYS {
        if let Some(value) = record.get(key) {
            match value {
                Value::String(s) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_booleans_and_empty() {
        assert_eq!(normalize(&json!("TRUE")), json!(true));
        assert_eq!(normalize(&json!("false ")), json!(false));
        assert_eq!(normalize(&json!("")), Value::Null);
        assert_eq!(normalize(&json!("  ")), Value::Null);
    }

    #[test]
    fn test_normalize_json_strings() {
        assert_eq!(normalize(&json!("{\"a\": 1}")), json!({"a": 1}));
        assert_eq!(normalize(&json!("[1, 2]")), json!([1, 2]));
        // Malformed JSON stays a string
        assert_eq!(normalize(&json!("{not json")), json!("{not json"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            json!("TRUE"),
            json!(true),
            json!(""),
            Value::Null,
            json!("  padded  "),
            json!("{\"k\": \"v\"}"),
            json!({"k": "v"}),
            json!(42),
        ] {
            let once = normalize(&raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_values_equal_across_representations() {
        assert!(values_equal(&json!(true), &json!("TRUE")));
        assert!(values_equal(&Value::Null, &json!("")));
        assert!(values_equal(&json!({"a": 1}), &json!("{\"a\": 1}")));
        assert!(!values_equal(&json!("Old Title"), &json!("New Title")));
    }

    #[test]
    fn test_title_case_round_trip() {
        assert_eq!(to_title_case("htmlTitle"), "Html Title");
        assert_eq!(to_title_case("html_title"), "Html Title");
        assert_eq!(canonical_field("Html Title"), "htmlTitle");
        assert_eq!(canonical_field("html_title"), "htmlTitle");
        assert_eq!(canonical_field("htmlTitle"), "htmlTitle");
        assert_eq!(canonical_field("Name"), "name");
        assert_eq!(canonical_field("Id"), "id");
    }

    #[test]
    fn test_camel_snake_conversions() {
        assert_eq!(snake_to_camel("meta_description"), "metaDescription");
        assert_eq!(camel_to_snake("metaDescription"), "meta_description");
        assert_eq!(camel_to_snake("id"), "id");
    }

    #[test]
    fn test_record_id_variants() {
        let rec = |k: &str, v: Value| {
            let mut m = serde_json::Map::new();
            m.insert(k.to_string(), v);
            m
        };
        assert_eq!(record_id(&rec("id", json!("42"))), Some("42".to_string()));
        assert_eq!(record_id(&rec("ID", json!(7))), Some("7".to_string()));
        assert_eq!(
            record_id(&rec("hubspot_page_id", json!("9"))),
            Some("9".to_string())
        );
        assert_eq!(record_id(&rec("name", json!("x"))), None);
        assert_eq!(record_id(&rec("id", json!(""))), None);
    }
}
