//! Canonical JSON encoding used as the hashing input.
//!
//! Rules (spec §9): object keys sorted ascending by Unicode code point, no
//! whitespace, strings normalized to NFC, arrays keep input order, numbers
//! use serde_json's own (shortest round-trip) representation.

use serde_json::Value;
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => canonical_string(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            // BTreeMap<&str, _> sorts by the key's natural Ord, which for
            // `str` is byte-wise — identical to ascending Unicode code point
            // order for valid UTF-8.
            let mut tree: BTreeMap<&str, &Value> = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k.as_str(), v);
            }
            let items: Vec<String> = tree.into_iter().map(|(k, v)| format!("{}:{}", canonical_string(k), to_canonical_json(v))).collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

fn canonical_string(s: &str) -> String {
    let normalized: String = s.nfc().collect();
    serde_json::to_string(&normalized).expect("string serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(to_canonical_json(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(to_canonical_json(&v), "[3,1,2]");
    }

    #[test]
    fn stable_across_key_insertion_order() {
        let v1 = json!({"domain": "animal", "topic": "zoo"});
        let v2 = json!({"topic": "zoo", "domain": "animal"});
        assert_eq!(to_canonical_json(&v1), to_canonical_json(&v2));
    }

    #[test]
    fn empty_object_and_null_are_distinct_encodings() {
        assert_eq!(to_canonical_json(&json!({})), "{}");
        assert_eq!(to_canonical_json(&Value::Null), "null");
    }
}
