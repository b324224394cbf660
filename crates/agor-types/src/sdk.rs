use crate::{ContentBlock, Role, ToolUseRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token counts for one turn, normalized across vendors.
///
/// `total_tokens` is always `input + output`. Cache reads are tracked
/// separately and never fold into the total: cached content was already
/// counted in the turn that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        }
    }

    /// Fresh (non-cache) tokens this turn added to the context window
    pub fn fresh_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Per-model usage breakdown as reported by vendors that run multiple
/// models in one turn (Claude's haiku sub-turns, for example)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    #[serde(flatten)]
    pub per_model: BTreeMap<String, TokenUsage>,
}

/// Vendor-agnostic summary of a completed SDK turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSdkData {
    pub token_usage: TokenUsage,
    /// Model's maximum context window (e.g. 200000 for Claude Sonnet)
    pub context_window_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Decoded vendor streaming event, uniform across tools.
///
/// Contract: `Partial` chunks always precede the matching `Complete` for the
/// same logical message; exactly one `Complete` per role boundary within a
/// turn; unknown vendor events are logged and dropped upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessedEvent {
    /// Token of assistant text
    Partial {
        text_chunk: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolved_model: Option<String>,
        /// Vendor session id, surfaced as soon as the vendor mints it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_session_id: Option<String>,
    },
    ThinkingPartial {
        thinking_chunk: String,
    },
    ThinkingComplete,
    ToolStart {
        tool_name: String,
        tool_use_id: String,
        input: serde_json::Value,
    },
    ToolComplete {
        tool_use_id: String,
        result: serde_json::Value,
    },
    /// Vendor system notification finished (e.g. compaction)
    SystemComplete {
        system_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    /// A full message at a role boundary
    Complete {
        role: Role,
        content: Vec<ContentBlock>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_uses: Option<Vec<ToolUseRef>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_usage: Option<TokenUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_usage: Option<ModelUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    /// Final turn result with the raw vendor payload
    Result {
        raw_sdk_message: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_usage: Option<TokenUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_usage: Option<ModelUsage>,
    },
    /// Abort detected; not an error
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.fresh_tokens(), 150);
    }

    #[test]
    fn test_processed_event_tagged_json() {
        let event = ProcessedEvent::Partial {
            text_chunk: "hi".into(),
            resolved_model: None,
            agent_session_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "partial");
        assert_eq!(json["text_chunk"], "hi");
    }
}
