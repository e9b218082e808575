//! The two DTOs that cross the persistence/coordinator boundary (§4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::TranslationStatus;

/// A claimed translation task, as handed from the Persistence Handler to
/// the Coordinator (and from there into a Processing Policy sub-batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: String,
    pub translation_id: String,
    pub text: String,
    pub context_hash: String,
    pub context_payload: Option<Value>,
    pub target_lang: String,
    pub source_lang: Option<String>,
}

/// The coordinator-facing result of one translation, whether it came fresh
/// from an engine, from the cache, or from persisted history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub business_id: Option<String>,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub target_lang: String,
    pub status: TranslationStatus,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub error: Option<String>,
    pub from_cache: bool,
    pub context_hash: String,
}

impl TranslationResult {
    /// Build a terminal failure result carrying no translated text.
    pub fn failed(item: &ContentItem, business_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            business_id,
            original_text: item.text.clone(),
            translated_text: None,
            target_lang: item.target_lang.clone(),
            status: TranslationStatus::Failed,
            engine: None,
            engine_version: None,
            error: Some(error.into()),
            from_cache: false,
            context_hash: item.context_hash.clone(),
        }
    }

    pub fn translated(
        item: &ContentItem,
        business_id: Option<String>,
        translated_text: impl Into<String>,
        engine: impl Into<String>,
        engine_version: impl Into<String>,
        from_cache: bool,
    ) -> Self {
        Self {
            business_id,
            original_text: item.text.clone(),
            translated_text: Some(translated_text.into()),
            target_lang: item.target_lang.clone(),
            status: TranslationStatus::Translated,
            engine: Some(engine.into()),
            engine_version: Some(engine_version.into()),
            error: None,
            from_cache,
            context_hash: item.context_hash.clone(),
        }
    }
}

/// A row snapshot used by the dead-letter archive (§3 Dead-Letter Entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: String,
    pub translation_id: Option<String>,
    pub original_payload: Value,
    pub context_payload: Option<Value>,
    pub target_lang_code: String,
    pub last_error_message: String,
    pub failed_at: DateTime<Utc>,
    pub engine_name: Option<String>,
    pub engine_version: Option<String>,
}
