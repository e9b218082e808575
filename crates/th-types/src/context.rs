//! Context payload wrapper (§3, §4.1, §9 Hashing stability).
//!
//! Hashing itself (canonical JSON + SHA-256) lives in `th-core::hashing`
//! because it is shared with the cache fingerprint; this module only owns
//! the request-facing shape and the "is this the global context" check.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
use crate::constants::GLOBAL_CONTEXT_SENTINEL;

/// A context payload as supplied by the caller of `Coordinator::request`.
///
/// `None` and `Some({})` are both first-class spellings of "no context" and
/// must hash to `GLOBAL_CONTEXT_SENTINEL` (spec §8 boundary behavior).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextSpec {
    pub payload: Option<Value>,
}

impl ContextSpec {
    pub fn none() -> Self {
        Self { payload: None }
    }

    pub fn new(payload: Value) -> Self {
        Self { payload: Some(payload) }
    }

    /// True if this context is equivalent to "no context" per §8: `null` or
    /// an empty object both count.
    pub fn is_global(&self) -> bool {
        match &self.payload {
            None => true,
            Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }

    pub fn canonical_payload(&self) -> Value {
        if self.is_global() {
            Value::Object(Default::default())
        } else {
            self.payload.clone().unwrap_or(Value::Null)
        }
    }
}

impl From<Option<Value>> for ContextSpec {
    fn from(payload: Option<Value>) -> Self {
        Self { payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn global_sentinel_covers_null_and_empty_object() {
        assert!(ContextSpec::none().is_global());
        assert!(ContextSpec::new(json!({})).is_global());
        assert!(!ContextSpec::new(json!({"domain": "animal"})).is_global());
        let _ = GLOBAL_CONTEXT_SENTINEL;
    }
}
