use crate::codex::models;
use crate::codex::schema::{CodexResult, CodexTokenUsage};
use crate::token_limits::resolve_model_limit;
use crate::traits::{NormalizeContext, SdkNormalizer};
use agor_types::{NormalizedSdkData, Task, TokenUsage};

/// Normalizer for Codex result payloads.
///
/// Codex reports cumulative session totals, so the per-turn figure is a
/// delta against the previous completed task's cumulative snapshot. Tasks
/// that never completed have no snapshot and are skipped; when no prior
/// snapshot exists the cumulative totals ARE the turn (first turn of the
/// vendor session).
pub struct CodexNormalizer;

fn cumulative_of(task: &Task) -> Option<CodexTokenUsage> {
    let raw = task.raw_sdk_response.as_ref()?;
    let result: CodexResult = serde_json::from_value(raw.clone()).ok()?;
    result.total_token_usage
}

impl SdkNormalizer for CodexNormalizer {
    fn normalize(
        &self,
        raw: &serde_json::Value,
        ctx: &NormalizeContext<'_>,
    ) -> Option<NormalizedSdkData> {
        let result: CodexResult = serde_json::from_value(raw.clone()).ok()?;
        let current = result.total_token_usage?;

        let previous = ctx
            .prior_tasks
            .iter()
            .rev()
            .find_map(cumulative_of)
            .unwrap_or_default();

        let input = current.input_tokens.saturating_sub(previous.input_tokens);
        let output = current.output_tokens.saturating_sub(previous.output_tokens);
        let cached = current
            .cached_input_tokens
            .saturating_sub(previous.cached_input_tokens);

        let mut usage = TokenUsage::new(input, output);
        usage.cache_read_tokens = cached;

        let context_window_limit = result
            .model
            .as_deref()
            .and_then(resolve_model_limit)
            .map(|spec| spec.context_window)
            .unwrap_or(models::DEFAULT_CONTEXT_WINDOW);

        Some(NormalizedSdkData {
            token_usage: usage,
            context_window_limit,
            cost_usd: None,
            primary_model: result.model,
            duration_ms: None,
        })
    }
}
