//! Row shapes fetched from `th_translations` and friends, and their
//! conversion into the public DTOs from `th-types`.

use serde_json::Value;
use sqlx::FromRow;
use th_types::{ContentItem, TranslationResult, TranslationStatus};

#[derive(Debug, Clone, FromRow)]
pub struct TranslationRow {
    pub id: String,
    pub content_id: String,
    pub context_id: Option<String>,
    pub lang_code: String,
    pub source_lang: Option<String>,
    pub status: String,
    pub translation_payload_json: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClaimedRow {
    pub id: String,
    pub content_id: String,
    pub context_id: Option<String>,
    pub business_id: String,
    pub source_payload_json: String,
    pub context_hash: String,
    pub context_payload_json: Option<String>,
    pub lang_code: String,
    pub source_lang: Option<String>,
}

impl ClaimedRow {
    pub fn into_content_item(self) -> ContentItem {
        let payload: Value = serde_json::from_str(&self.source_payload_json).unwrap_or(Value::Null);
        let text = payload.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
        let context_payload = self.context_payload_json.as_deref().and_then(|s| serde_json::from_str(s).ok());
        ContentItem {
            content_id: self.content_id,
            translation_id: self.id,
            text,
            context_hash: self.context_hash,
            context_payload,
            target_lang: self.lang_code,
            source_lang: self.source_lang,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TranslationJoinRow {
    pub id: String,
    pub business_id: String,
    pub source_payload_json: String,
    pub lang_code: String,
    pub status: String,
    pub translation_payload_json: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub error: Option<String>,
    pub context_hash: Option<String>,
}

impl TranslationJoinRow {
    pub fn into_translation_result(self) -> TranslationResult {
        let original: Value = serde_json::from_str(&self.source_payload_json).unwrap_or(Value::Null);
        let original_text = original.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
        let status: TranslationStatus = self.status.parse().unwrap_or(TranslationStatus::Pending);
        let translated_text = self.translation_payload_json.as_deref().and_then(|s| serde_json::from_str::<Value>(s).ok()).and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_string));
        TranslationResult {
            business_id: Some(self.business_id),
            original_text,
            translated_text,
            target_lang: self.lang_code,
            status,
            engine: self.engine,
            engine_version: self.engine_version,
            error: self.error,
            from_cache: false,
            context_hash: self.context_hash.unwrap_or_else(|| th_types::GLOBAL_CONTEXT_SENTINEL.to_string()),
        }
    }
}
