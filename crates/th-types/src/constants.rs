//! Stable constants shared across the core.
//!
//! `GLOBAL_CONTEXT_SENTINEL` participates in the `context_hash` column and
//! therefore in cache fingerprints; changing it is a breaking, cross-version
//! compatibility change (see spec §3 and §9 Hashing stability).

/// Sentinel `context_hash` used for "no context" rows.
pub const GLOBAL_CONTEXT_SENTINEL: &str = "__GLOBAL__";

/// Logical engine-result length/ordering contract version. Bumping this is
/// not expected to change hashing; it documents the batch orchestration
/// contract described in §4.3.
pub const ENGINE_BATCH_CONTRACT_VERSION: &str = "1.0";
