//! th-policies: the Processing Policy (§4.7) — what to do with one batch
//! of already-claimed tasks that share a single `context_hash`: cache
//! partition → retry loop with backoff → DLQ on exhaustion → persist →
//! emit, preserving input order throughout.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, instrument};

use th_cache::{CachedTranslation, TranslationCache};
use th_core::fingerprint;
use th_engine::{translate_batch, Engine};
use th_persistence::{DlqInput, PersistenceHandler, TranslationUpdate};
use th_runtime::RateLimiter;
use th_types::{ContentItem, EngineResult, TranslationResult, TranslationStatus};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff: Duration::from_secs(1), max_backoff: Duration::from_secs(30) }
    }
}

/// The small, immutable bundle the Coordinator hands to a policy invocation
/// (§9 "avoiding circular references" — the policy never holds a
/// back-pointer to the Coordinator).
pub struct ProcessingContext {
    pub engine: Arc<dyn Engine>,
    pub cache: Arc<TranslationCache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub persistence: Arc<dyn PersistenceHandler>,
    pub retry: RetryConfig,
}

struct PendingItem {
    index: usize,
    item: ContentItem,
    last_error: String,
}

/// Runs one batch — all sharing a single `context_hash` — through the
/// cache/retry/DLQ/persist/emit pipeline, returning results in input order.
#[instrument(skip(ctx, batch))]
pub async fn process_batch(ctx: &ProcessingContext, batch: Vec<ContentItem>) -> Vec<TranslationResult> {
    if batch.is_empty() {
        return Vec::new();
    }

    let canonical_context = batch[0].context_payload.clone();
    if batch.iter().any(|item| item.context_payload != canonical_context) {
        error!("programmer error: mixed contexts in one processing batch; treating the first item's context as canonical");
    }
    let target_lang = batch[0].target_lang.clone();
    let source_lang = batch.iter().find_map(|item| item.source_lang.clone());

    let mut results: Vec<Option<TranslationResult>> = vec![None; batch.len()];
    let mut updates: Vec<TranslationUpdate> = Vec::new();
    let mut dlq_entries: Vec<DlqInput> = Vec::new();
    let mut newly_translated: Vec<(String, CachedTranslation)> = Vec::new();

    let mut pending: Vec<PendingItem> = Vec::with_capacity(batch.len());
    for (index, item) in batch.into_iter().enumerate() {
        let fp = fingerprint(&item.target_lang, item.source_lang.as_deref(), &item.context_hash, &item.text);
        if let Some(cached) = ctx.cache.get(&fp).await {
            results[index] = Some(TranslationResult {
                business_id: None,
                original_text: item.text.clone(),
                translated_text: Some(cached.translated_text.clone()),
                target_lang: item.target_lang.clone(),
                status: TranslationStatus::Translated,
                engine: Some(cached.engine.clone()),
                engine_version: Some(cached.engine_version.clone()),
                error: None,
                from_cache: true,
                context_hash: item.context_hash.clone(),
            });
            updates.push(TranslationUpdate {
                translation_id: item.translation_id.clone(),
                status: TranslationStatus::Translated,
                translated_text: Some(cached.translated_text),
                engine: Some(cached.engine),
                engine_version: Some(cached.engine_version),
                error: None,
            });
        } else {
            pending.push(PendingItem { index, item, last_error: String::new() });
        }
    }

    if !pending.is_empty() {
        run_retry_loop(ctx, &mut pending, &target_lang, source_lang.as_deref(), canonical_context.as_ref(), &mut results, &mut updates, &mut dlq_entries, &mut newly_translated).await;
    }

    for (fp, cached) in newly_translated {
        ctx.cache.put(fp, cached).await;
    }

    if let Err(err) = ctx.persistence.save_results(&updates).await {
        error!(error = %err, "failed to persist batch results");
    }
    for entry in dlq_entries {
        if let Err(err) = ctx.persistence.move_to_dlq(entry).await {
            error!(error = %err, "failed to append dead-letter entry");
        }
    }

    results.into_iter().map(|r| r.expect("every index is filled by either cache or the retry loop")).collect()
}

#[allow(clippy::too_many_arguments)]
async fn run_retry_loop(
    ctx: &ProcessingContext,
    pending: &mut Vec<PendingItem>,
    target_lang: &str,
    source_lang: Option<&str>,
    context_payload: Option<&Value>,
    results: &mut [Option<TranslationResult>],
    updates: &mut Vec<TranslationUpdate>,
    dlq_entries: &mut Vec<DlqInput>,
    newly_translated: &mut Vec<(String, CachedTranslation)>,
) {
    let mut attempt: u32 = 1;
    loop {
        ctx.rate_limiter.acquire(pending.len() as u64).await;

        let texts: Vec<String> = pending.iter().map(|p| p.item.text.clone()).collect();
        let outcomes = translate_batch(ctx.engine.as_ref(), &texts, target_lang, source_lang, context_payload).await;
        let outcomes = reconcile_length(outcomes, texts.len());

        let mut still_pending = Vec::new();
        for (mut p, outcome) in pending.drain(..).zip(outcomes) {
            match outcome {
                EngineResult::Success { translated_text, .. } => {
                    let fp = fingerprint(target_lang, source_lang, &p.item.context_hash, &p.item.text);
                    results[p.index] = Some(TranslationResult::translated(&p.item, None, translated_text.clone(), ctx.engine.name(), ctx.engine.version(), false));
                    updates.push(TranslationUpdate {
                        translation_id: p.item.translation_id.clone(),
                        status: TranslationStatus::Translated,
                        translated_text: Some(translated_text.clone()),
                        engine: Some(ctx.engine.name().to_string()),
                        engine_version: Some(ctx.engine.version().to_string()),
                        error: None,
                    });
                    newly_translated.push((fp, CachedTranslation { translated_text, engine: ctx.engine.name().to_string(), engine_version: ctx.engine.version().to_string(), stored_at: std::time::Instant::now() }));
                }
                EngineResult::Error { message, is_retryable: false } => {
                    finalize_failure(p.index, &p.item, message, results, updates, dlq_entries, ctx);
                }
                EngineResult::Error { message, is_retryable: true } => {
                    p.last_error = message;
                    still_pending.push(p);
                }
            }
        }
        *pending = still_pending;

        if pending.is_empty() {
            return;
        }
        if attempt >= ctx.retry.max_attempts {
            break;
        }
        let backoff = ctx.retry.initial_backoff.mul_f64(2f64.powi(attempt as i32 - 1)).min(ctx.retry.max_backoff);
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }

    for p in pending.drain(..) {
        let message = p.last_error.clone();
        finalize_failure(p.index, &p.item, message, results, updates, dlq_entries, ctx);
    }
}

fn finalize_failure(index: usize, item: &ContentItem, message: String, results: &mut [Option<TranslationResult>], updates: &mut Vec<TranslationUpdate>, dlq_entries: &mut Vec<DlqInput>, ctx: &ProcessingContext) {
    results[index] = Some(TranslationResult::failed(item, None, message.clone()));
    updates.push(TranslationUpdate {
        translation_id: item.translation_id.clone(),
        status: TranslationStatus::Failed,
        translated_text: None,
        engine: None,
        engine_version: None,
        error: Some(message.clone()),
    });
    dlq_entries.push(DlqInput {
        translation_id: Some(item.translation_id.clone()),
        original_payload: serde_json::json!({ "text": item.text }),
        context_payload: item.context_payload.clone(),
        target_lang_code: item.target_lang.clone(),
        last_error_message: message,
        engine_name: Some(ctx.engine.name().to_string()),
        engine_version: Some(ctx.engine.version().to_string()),
    });
}

/// An engine that violates the batch length/ordering contract: items past
/// the expected length are dropped, missing ones become a retryable
/// contract-violation error (§4.7 edge cases).
fn reconcile_length(mut outcomes: Vec<EngineResult>, expected: usize) -> Vec<EngineResult> {
    outcomes.truncate(expected);
    while outcomes.len() < expected {
        outcomes.push(EngineResult::retryable("engine contract violation"));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use th_engine::{DebugEngine};
    use th_engine::debug_engine::DebugMode;
    use th_runtime::NullRateLimiter;
    use th_persistence::{connect_any, run_migrations, SqlPersistence};

    use super::*;

    /// Fails every item on its first call, succeeds on every call after
    /// that — exercises the retry loop's happy path (§4.7, §8 scenario 3).
    struct FailOnceEngine {
        calls: AtomicU32,
    }

    impl FailOnceEngine {
        fn new() -> Self {
            Self { calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl Engine for FailOnceEngine {
        fn name(&self) -> &str {
            "fail-once"
        }

        fn version(&self) -> &str {
            "1.0"
        }

        async fn translate_one(&self, text: &str, target_lang: &str, _source_lang: Option<&str>, _context_payload: Option<&Value>) -> EngineResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                EngineResult::retryable("flaky on first attempt")
            } else {
                EngineResult::success(format!("[{target_lang}]{text}"))
            }
        }
    }

    fn item(text: &str, translation_id: &str) -> ContentItem {
        ContentItem {
            content_id: "content-1".to_string(),
            translation_id: translation_id.to_string(),
            text: text.to_string(),
            context_hash: th_types::GLOBAL_CONTEXT_SENTINEL.to_string(),
            context_payload: None,
            target_lang: "fr".to_string(),
            source_lang: None,
        }
    }

    async fn context(engine: Arc<dyn Engine>) -> ProcessingContext {
        let pool = connect_any("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        ProcessingContext {
            engine,
            cache: Arc::new(TranslationCache::new(100, Duration::from_secs(60))),
            rate_limiter: Arc::new(NullRateLimiter),
            persistence: Arc::new(SqlPersistence::new(pool)),
            retry: RetryConfig { max_attempts: 2, initial_backoff: Duration::from_millis(1), max_backoff: Duration::from_millis(5) },
        }
    }

    #[tokio::test]
    async fn empty_batch_produces_no_work() {
        let ctx = context(Arc::new(DebugEngine::new(DebugMode::Success))).await;
        let results = process_batch(&ctx, Vec::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn successful_batch_preserves_order() {
        let ctx = context(Arc::new(DebugEngine::new(DebugMode::Success))).await;
        let batch = vec![item("a", "t1"), item("b", "t2")];
        let results = process_batch(&ctx, batch).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].translated_text.as_deref(), Some("[fr]a"));
        assert_eq!(results[1].translated_text.as_deref(), Some("[fr]b"));
        assert!(results.iter().all(|r| r.status == TranslationStatus::Translated));
    }

    #[tokio::test]
    async fn exhausted_retries_become_failed_and_go_to_dlq() {
        let ctx = context(Arc::new(DebugEngine::new(DebugMode::Fail))).await;
        let batch = vec![item("a", "t1")];
        let results = process_batch(&ctx, batch).await;
        assert_eq!(results[0].status, TranslationStatus::Failed);
    }

    #[tokio::test]
    async fn fails_once_then_succeeds_on_retry() {
        let engine = Arc::new(FailOnceEngine::new());
        let ctx = context(engine.clone()).await;
        let batch = vec![item("a", "t1")];
        let results = process_batch(&ctx, batch).await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2, "expected exactly one retry after the first failure");
        assert_eq!(results[0].status, TranslationStatus::Translated);
        assert_eq!(results[0].translated_text.as_deref(), Some("[fr]a"));
    }
}
