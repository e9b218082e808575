//! SHA-256 hash helpers built on canonical JSON.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::canonical_json::to_canonical_json;
use th_types::GLOBAL_CONTEXT_SENTINEL;

pub fn hash_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn hash_value(v: &Value) -> String {
    hash_str(&to_canonical_json(v))
}

/// `context_hash` per §3: SHA-256 of the canonicalized context payload, or
/// the `__GLOBAL__` sentinel when the payload is absent/empty (§8 boundary
/// behavior: `null` and `{}` map to the same hash class).
pub fn context_hash(payload: Option<&Value>) -> String {
    match payload {
        None => GLOBAL_CONTEXT_SENTINEL.to_string(),
        Some(Value::Null) => GLOBAL_CONTEXT_SENTINEL.to_string(),
        Some(Value::Object(map)) if map.is_empty() => GLOBAL_CONTEXT_SENTINEL.to_string(),
        Some(v) => hash_value(v),
    }
}

/// Cache fingerprint per §4.5:
/// `SHA-256(lang_code || 0x1F || source_lang||"" || 0x1F || context_hash || 0x1F || text)`.
pub fn fingerprint(lang_code: &str, source_lang: Option<&str>, context_hash: &str, text: &str) -> String {
    const UNIT_SEPARATOR: u8 = 0x1F;
    let mut hasher = Sha256::new();
    hasher.update(lang_code.as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(source_lang.unwrap_or("").as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(context_hash.as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_object_share_sentinel() {
        assert_eq!(context_hash(None), GLOBAL_CONTEXT_SENTINEL);
        assert_eq!(context_hash(Some(&Value::Null)), GLOBAL_CONTEXT_SENTINEL);
        assert_eq!(context_hash(Some(&json!({}))), GLOBAL_CONTEXT_SENTINEL);
    }

    #[test]
    fn distinct_contexts_hash_differently() {
        let h1 = context_hash(Some(&json!({"domain": "animal"})));
        let h2 = context_hash(Some(&json!({"domain": "car"})));
        assert_ne!(h1, h2);
        assert_ne!(h1, GLOBAL_CONTEXT_SENTINEL);
    }

    #[test]
    fn fingerprint_is_sensitive_to_every_component() {
        let base = fingerprint("fr", None, GLOBAL_CONTEXT_SENTINEL, "Hello");
        assert_ne!(base, fingerprint("de", None, GLOBAL_CONTEXT_SENTINEL, "Hello"));
        assert_ne!(base, fingerprint("fr", Some("en"), GLOBAL_CONTEXT_SENTINEL, "Hello"));
        assert_ne!(base, fingerprint("fr", None, "somehash", "Hello"));
        assert_ne!(base, fingerprint("fr", None, GLOBAL_CONTEXT_SENTINEL, "Bye"));
    }

    #[test]
    fn hash_value_is_order_independent() {
        let a = hash_value(&json!({"x": 1, "y": 2}));
        let b = hash_value(&json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
    }
}
