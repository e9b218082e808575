//! th-core: canonicalization, hashing, and the shared error taxonomy.
//!
//! Reproducibility of `context_hash` and cache fingerprints depends entirely
//! on the canonical JSON encoding defined here (§9 Hashing stability):
//! ascending Unicode code-point key order, no whitespace, strings in NFC,
//! array order preserved.

pub mod errors;
pub mod hashing;
pub mod validation;

pub use errors::{ConfigurationError, StorageError, TransHubError, ValidationError};
pub use hashing::{context_hash, fingerprint, hash_str, to_canonical_json};
pub use validation::{validate_lang_code, validate_target_langs, validate_text};
