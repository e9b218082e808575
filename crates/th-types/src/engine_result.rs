//! Tagged engine outcome (§4.1, §4.3, §7).
//!
//! `EngineError` is a *value*, never an exception: engines communicate
//! expected failure modes by returning it, not by raising. The batch
//! orchestrator in `th-engine` is the only place an actual panic/exception
//! from a misbehaving engine gets converted into one of these.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EngineResult {
    Success { translated_text: String, from_engine_cache: bool },
    Error { message: String, is_retryable: bool },
}

impl EngineResult {
    pub fn success(translated_text: impl Into<String>) -> Self {
        EngineResult::Success { translated_text: translated_text.into(), from_engine_cache: false }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        EngineResult::Error { message: message.into(), is_retryable: true }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        EngineResult::Error { message: message.into(), is_retryable: false }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EngineResult::Success { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineResult::Error { is_retryable: true, .. })
    }
}
