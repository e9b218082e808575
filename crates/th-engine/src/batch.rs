//! Batch orchestration provided by the abstraction, not by individual
//! engines (§4.3).

use std::panic::AssertUnwindSafe;

use futures::{stream, FutureExt, StreamExt};
use serde_json::Value;
use th_types::EngineResult;

use crate::Engine;

/// Runs `translate_one` across `texts` with bounded fan-out, preserving
/// input order in the output. Output length always equals input length.
pub async fn translate_batch(engine: &dyn Engine, texts: &[String], target_lang: &str, source_lang: Option<&str>, context_payload: Option<&Value>) -> Vec<EngineResult> {
    if texts.is_empty() {
        return Vec::new();
    }

    if engine.requires_source_lang() && source_lang.is_none() {
        return texts.iter().map(|_| EngineResult::terminal("source_lang required")).collect();
    }

    if engine.accepts_context() {
        if let Err(reason) = engine.validate_context(context_payload) {
            let message = format!("context validation failed: {reason}");
            return texts.iter().map(|_| EngineResult::terminal(message.clone())).collect();
        }
    }

    let concurrency = engine.max_concurrency().max(1);
    stream::iter(texts.iter())
        .map(|text| {
            let fut = engine.translate_one(text, target_lang, source_lang, context_payload);
            AssertUnwindSafe(fut).catch_unwind()
        })
        .buffered(concurrency)
        .map(|outcome| match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                EngineResult::retryable(format!("engine panicked: {message}"))
            }
        })
        .collect()
        .await
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
