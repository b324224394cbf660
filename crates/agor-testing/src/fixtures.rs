use serde_json::{Value, json};

/// Claude stream-json transcript for a plain text turn: init banner,
/// streaming delta, full assistant message, final result.
pub fn claude_text_transcript(sdk_session_id: &str, reply: &str) -> Vec<Value> {
    vec![
        json!({
            "type": "system",
            "subtype": "init",
            "session_id": sdk_session_id,
            "model": "claude-sonnet-4-5-20250929"
        }),
        json!({
            "type": "stream_event",
            "event": {
                "type": "content_block_delta",
                "delta": { "type": "text_delta", "text": reply }
            }
        }),
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5-20250929",
                "content": [{ "type": "text", "text": reply }],
                "usage": { "input_tokens": 12, "output_tokens": 6 }
            }
        }),
        claude_result(sdk_session_id, 12, 6),
    ]
}

/// Claude final result with a single-model `modelUsage` map
pub fn claude_result(sdk_session_id: &str, input: u64, output: u64) -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "is_error": false,
        "duration_ms": 1200,
        "session_id": sdk_session_id,
        "total_cost_usd": 0.003,
        "usage": { "input_tokens": input, "output_tokens": output },
        "modelUsage": {
            "claude-sonnet-4-5-20250929": {
                "inputTokens": input,
                "outputTokens": output,
                "cacheReadInputTokens": 0,
                "cacheCreationInputTokens": 0,
                "contextWindow": 200000,
                "costUSD": 0.003
            }
        }
    })
}

/// Claude transcript whose turn triggers one Bash tool use before the
/// final text
pub fn claude_tool_transcript(sdk_session_id: &str) -> Vec<Value> {
    vec![
        json!({
            "type": "system",
            "subtype": "init",
            "session_id": sdk_session_id,
            "model": "claude-sonnet-4-5-20250929"
        }),
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5-20250929",
                "content": [
                    { "type": "text", "text": "Let me check." },
                    { "type": "tool_use", "id": "toolu_1", "name": "Bash",
                      "input": { "command": "ls" } }
                ],
                "usage": { "input_tokens": 20, "output_tokens": 8 }
            }
        }),
        json!({
            "type": "user",
            "message": {
                "content": [
                    { "type": "tool_result", "tool_use_id": "toolu_1",
                      "content": "README.md", "is_error": false }
                ]
            }
        }),
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5-20250929",
                "content": [{ "type": "text", "text": "One file: README.md" }],
                "usage": { "input_tokens": 30, "output_tokens": 9 }
            }
        }),
        claude_result(sdk_session_id, 50, 17),
    ]
}

/// Claude transcript containing a compaction boundary, with the turn's
/// own token usage
pub fn claude_compaction_transcript(sdk_session_id: &str, input: u64, output: u64) -> Vec<Value> {
    vec![
        json!({
            "type": "system",
            "subtype": "init",
            "session_id": sdk_session_id,
            "model": "claude-sonnet-4-5-20250929"
        }),
        json!({
            "type": "system",
            "subtype": "compact_boundary",
            "compact_metadata": { "trigger": "auto", "pre_tokens": 154000 }
        }),
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5-20250929",
                "content": [{ "type": "text", "text": "Compacted, carrying on." }],
                "usage": { "input_tokens": input, "output_tokens": output }
            }
        }),
        claude_result(sdk_session_id, input, output),
    ]
}

/// Codex exec transcript: banner, deltas, cumulative token counts, done
pub fn codex_transcript(session_id: &str, cumulative_input: u64, cumulative_output: u64) -> Vec<Value> {
    vec![
        json!({"id": "0", "msg": {"type": "session_configured", "session_id": session_id, "model": "gpt-5-codex"}}),
        json!({"id": "1", "msg": {"type": "task_started"}}),
        json!({"id": "1", "msg": {"type": "agent_message_delta", "delta": "work"}}),
        json!({"id": "1", "msg": {"type": "agent_message", "message": "working on it"}}),
        json!({"id": "1", "msg": {"type": "token_count", "info": {"total_token_usage": {
            "input_tokens": cumulative_input,
            "output_tokens": cumulative_output,
            "total_tokens": cumulative_input + cumulative_output
        }}}}),
        json!({"id": "1", "msg": {"type": "task_complete", "last_agent_message": "working on it"}}),
    ]
}

/// Gemini generateContent response with a plain text candidate
pub fn gemini_text_response(reply: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": reply }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 40,
            "candidatesTokenCount": 15,
            "totalTokenCount": 55
        },
        "modelVersion": "gemini-2.5-pro"
    })
}
