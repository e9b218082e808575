//! Canonicalization and hashing.
//!
//! `to_canonical_json` guarantees the ordering spec.md §9 requires.
//! `hash_str`/`hash_value` produce the SHA-256 hex digests used for
//! `context_hash` (§3) and cache fingerprints (§4.5).

mod canonical_json;
mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{context_hash, fingerprint, hash_str, hash_value};
