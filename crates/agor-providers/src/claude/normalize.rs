use crate::claude::models;
use crate::claude::schema::ResultRecord;
use crate::token_limits::resolve_model_limit;
use crate::traits::{NormalizeContext, SdkNormalizer};
use agor_types::{NormalizedSdkData, TokenUsage};

/// Normalizer for Claude Code result payloads.
///
/// Preferred path is the per-model `modelUsage` map: token fields are
/// summed across every model that ran (main model plus haiku sub-turns)
/// and the context window is the largest per-model window. When the map is
/// absent the top-level `usage` object is the fallback.
pub struct ClaudeNormalizer;

impl SdkNormalizer for ClaudeNormalizer {
    fn normalize(
        &self,
        raw: &serde_json::Value,
        _ctx: &NormalizeContext<'_>,
    ) -> Option<NormalizedSdkData> {
        let result: ResultRecord = serde_json::from_value(raw.clone()).ok()?;

        if let Some(per_model) = result.model_usage.as_ref().filter(|m| !m.is_empty()) {
            let mut usage = TokenUsage::default();
            let mut context_window_limit = 0u64;
            let mut primary: Option<(&String, u64)> = None;

            for (model, m) in per_model {
                usage.input_tokens += m.input_tokens;
                usage.output_tokens += m.output_tokens;
                usage.cache_read_tokens += m.cache_read_input_tokens;
                usage.cache_creation_tokens += m.cache_creation_input_tokens;

                let window = m
                    .context_window
                    .or_else(|| resolve_model_limit(model).map(|s| s.context_window))
                    .unwrap_or(models::DEFAULT_CONTEXT_WINDOW);
                context_window_limit = context_window_limit.max(window);

                let volume = m.input_tokens + m.output_tokens;
                if primary.map(|(_, best)| volume > best).unwrap_or(true) {
                    primary = Some((model, volume));
                }
            }
            usage.total_tokens = usage.input_tokens + usage.output_tokens;

            return Some(NormalizedSdkData {
                token_usage: usage,
                context_window_limit,
                cost_usd: result.total_cost_usd,
                primary_model: primary.map(|(model, _)| model.clone()),
                duration_ms: result.duration_ms,
            });
        }

        let top = result.usage?;
        let mut usage = TokenUsage::new(top.input_tokens, top.output_tokens);
        usage.cache_read_tokens = top.cache_read_input_tokens;
        usage.cache_creation_tokens = top.cache_creation_input_tokens;

        Some(NormalizedSdkData {
            token_usage: usage,
            context_window_limit: models::DEFAULT_CONTEXT_WINDOW,
            cost_usd: result.total_cost_usd,
            primary_model: None,
            duration_ms: result.duration_ms,
        })
    }
}
