//! `DebugEngine`: the reference implementation used in tests (§4.3).

use async_trait::async_trait;
use serde_json::Value;
use th_types::EngineResult;

use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    Success,
    Fail,
}

pub struct DebugEngine {
    mode: DebugMode,
}

impl DebugEngine {
    pub fn new(mode: DebugMode) -> Self {
        Self { mode }
    }
}

impl Default for DebugEngine {
    fn default() -> Self {
        Self::new(DebugMode::Success)
    }
}

#[async_trait]
impl Engine for DebugEngine {
    fn name(&self) -> &str {
        "debug"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    async fn translate_one(&self, text: &str, target_lang: &str, _source_lang: Option<&str>, _context_payload: Option<&Value>) -> EngineResult {
        match self.mode {
            DebugMode::Success => EngineResult::success(format!("[{target_lang}]{text}")),
            DebugMode::Fail => EngineResult::retryable("debug engine configured to fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_mode_prefixes_text() {
        let engine = DebugEngine::new(DebugMode::Success);
        let result = engine.translate_one("hello", "fr", None, None).await;
        assert_eq!(result, EngineResult::success("[fr]hello"));
    }

    #[tokio::test]
    async fn fail_mode_is_retryable() {
        let engine = DebugEngine::new(DebugMode::Fail);
        let result = engine.translate_one("hello", "fr", None, None).await;
        assert!(result.is_retryable());
    }
}
