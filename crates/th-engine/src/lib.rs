//! th-engine: the Engine Abstraction (§4.3) — the trait every concrete
//! translator implements, plus the batch orchestration the abstraction
//! provides so individual engines only ever implement `translate_one`.

pub mod batch;
pub mod debug_engine;
pub mod registry;

pub use batch::translate_batch;
pub use debug_engine::DebugEngine;
pub use registry::EngineRegistry;

use async_trait::async_trait;
use serde_json::Value;
use th_types::EngineResult;

/// A pluggable translator. The only method a concrete engine must supply is
/// `translate_one`; everything else has a sane default.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    /// Whether this engine understands a per-batch context payload at all.
    fn accepts_context(&self) -> bool {
        false
    }

    /// If `true`, a batch call lacking `source_lang` fails every item with
    /// a non-retryable error instead of reaching `translate_one` (§4.3).
    fn requires_source_lang(&self) -> bool {
        false
    }

    /// Bounded fan-out for `translate_batch`'s concurrent dispatch.
    /// Defaults to 1 (strictly sequential); engines whose backend can take
    /// concurrent requests override this.
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Validates a context payload against this engine's `context_model`,
    /// if it has one. The default accepts anything.
    fn validate_context(&self, _context_payload: Option<&Value>) -> Result<(), String> {
        Ok(())
    }

    /// Translate a single text. Must never panic or propagate an exception
    /// for an expected failure mode — communicate it through `EngineResult`.
    async fn translate_one(&self, text: &str, target_lang: &str, source_lang: Option<&str>, context_payload: Option<&Value>) -> EngineResult;

    /// Optional warm-up / credential check. Idempotent.
    async fn initialize(&self) -> Result<(), String> {
        Ok(())
    }

    /// Optional resource release. Idempotent.
    async fn close(&self) -> Result<(), String> {
        Ok(())
    }
}
