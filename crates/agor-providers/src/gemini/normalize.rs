use crate::gemini::models;
use crate::gemini::schema::GeminiResult;
use crate::token_limits::resolve_model_limit;
use crate::traits::{NormalizeContext, SdkNormalizer};
use agor_types::{NormalizedSdkData, TokenUsage};

/// Normalizer for Gemini result payloads.
///
/// Gemini reports per-turn counts, so no delta computation is needed.
/// Thought tokens count as output; cached-content reads map to
/// `cache_read_tokens` and Gemini has no cache-creation notion.
pub struct GeminiNormalizer;

impl SdkNormalizer for GeminiNormalizer {
    fn normalize(
        &self,
        raw: &serde_json::Value,
        _ctx: &NormalizeContext<'_>,
    ) -> Option<NormalizedSdkData> {
        let result: GeminiResult = serde_json::from_value(raw.clone()).ok()?;
        let usage_meta = result.usage_metadata?;

        let output =
            usage_meta.candidates_token_count + usage_meta.thoughts_token_count.unwrap_or(0);
        let mut usage = TokenUsage::new(usage_meta.prompt_token_count, output);
        usage.cache_read_tokens = usage_meta.cached_content_token_count.unwrap_or(0);

        let context_window_limit = result
            .model_version
            .as_deref()
            .and_then(resolve_model_limit)
            .map(|spec| spec.context_window)
            .unwrap_or(models::DEFAULT_CONTEXT_WINDOW);

        Some(NormalizedSdkData {
            token_usage: usage,
            context_window_limit,
            cost_usd: None,
            primary_model: result.model_version,
            duration_ms: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_per_turn_counts() {
        let raw = json!({
            "modelVersion": "gemini-2.5-pro",
            "usageMetadata": {
                "promptTokenCount": 300,
                "candidatesTokenCount": 80,
                "thoughtsTokenCount": 20,
                "cachedContentTokenCount": 50,
                "totalTokenCount": 400
            }
        });
        let data = GeminiNormalizer
            .normalize(&raw, &NormalizeContext::empty())
            .unwrap();
        assert_eq!(data.token_usage.input_tokens, 300);
        assert_eq!(data.token_usage.output_tokens, 100);
        assert_eq!(data.token_usage.total_tokens, 400);
        assert_eq!(data.token_usage.cache_read_tokens, 50);
        assert_eq!(data.token_usage.cache_creation_tokens, 0);
        assert_eq!(data.context_window_limit, 1_048_576);
    }

    #[test]
    fn test_missing_cached_count_is_zero() {
        let raw = json!({
            "modelVersion": "gemini-2.5-flash",
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        });
        let data = GeminiNormalizer
            .normalize(&raw, &NormalizeContext::empty())
            .unwrap();
        assert_eq!(data.token_usage.cache_read_tokens, 0);
    }

    #[test]
    fn test_no_usage_is_none() {
        let raw = json!({"modelVersion": "gemini-2.5-pro"});
        assert!(
            GeminiNormalizer
                .normalize(&raw, &NormalizeContext::empty())
                .is_none()
        );
    }
}
