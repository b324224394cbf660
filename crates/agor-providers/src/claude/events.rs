use crate::claude::schema::*;
use agor_types::{
    ContentBlock, ModelUsage, ProcessedEvent, Role, TokenUsage, ToolUseRef,
};
use tracing::debug;

/// Decode one Claude stream-json record into `ProcessedEvent`s.
///
/// Pure over the input: assistant messages fan out into `ToolStart`s plus
/// one `Complete`; tool results arrive as user-side records and fan out
/// into `ToolComplete`s plus one `Complete`. Unknown records decode to an
/// empty vec after a debug log.
pub fn decode_event(raw: &serde_json::Value) -> Vec<ProcessedEvent> {
    let record: ClaudeStreamRecord = match serde_json::from_value(raw.clone()) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "undecodable claude event dropped");
            return Vec::new();
        }
    };

    match record {
        ClaudeStreamRecord::System(system) => decode_system(system),
        ClaudeStreamRecord::Assistant(assistant) => decode_assistant(assistant),
        ClaudeStreamRecord::User(user) => decode_user(user),
        ClaudeStreamRecord::StreamEvent(stream) => decode_stream_event(stream),
        ClaudeStreamRecord::Result(result) => decode_result(result, raw),
        ClaudeStreamRecord::Unknown => {
            debug!("unknown claude event type dropped");
            Vec::new()
        }
    }
}

fn decode_system(system: SystemRecord) -> Vec<ProcessedEvent> {
    match system.subtype.as_deref() {
        Some("init") => vec![ProcessedEvent::Partial {
            text_chunk: String::new(),
            resolved_model: system.model,
            agent_session_id: system.session_id,
        }],
        Some("compact_boundary") | Some("compaction") => vec![ProcessedEvent::SystemComplete {
            system_type: "compaction".to_string(),
            metadata: system.compact_metadata,
        }],
        _ => Vec::new(),
    }
}

fn decode_assistant(assistant: AssistantRecord) -> Vec<ProcessedEvent> {
    let mut events = Vec::new();
    let mut content = Vec::new();
    let mut tool_uses = Vec::new();

    for block in &assistant.message.content {
        match block {
            ClaudeContentBlock::Text { text } => {
                content.push(ContentBlock::Text { text: text.clone() });
            }
            ClaudeContentBlock::Thinking { thinking } => {
                content.push(ContentBlock::Thinking {
                    thinking: thinking.clone(),
                });
            }
            ClaudeContentBlock::ToolUse { id, name, input } => {
                events.push(ProcessedEvent::ToolStart {
                    tool_name: name.clone(),
                    tool_use_id: id.clone(),
                    input: input.clone(),
                });
                tool_uses.push(ToolUseRef {
                    tool_use_id: id.clone(),
                    tool_name: name.clone(),
                });
                content.push(ContentBlock::ToolUse {
                    tool_use_id: id.clone(),
                    tool_name: name.clone(),
                    input: input.clone(),
                });
            }
            ClaudeContentBlock::ToolResult { .. } | ClaudeContentBlock::Unknown => {}
        }
    }

    let token_usage = assistant.message.usage.as_ref().map(usage_to_tokens);

    events.push(ProcessedEvent::Complete {
        role: Role::Assistant,
        content,
        tool_uses: if tool_uses.is_empty() {
            None
        } else {
            Some(tool_uses)
        },
        parent_tool_use_id: assistant.parent_tool_use_id,
        token_usage,
        model_usage: None,
        duration_ms: None,
    });
    events
}

fn decode_user(user: UserRecord) -> Vec<ProcessedEvent> {
    let mut events = Vec::new();
    let mut content = Vec::new();

    for block in &user.message.content {
        match block {
            ClaudeContentBlock::ToolResult {
                tool_use_id,
                content: result,
                is_error,
            } => {
                events.push(ProcessedEvent::ToolComplete {
                    tool_use_id: tool_use_id.clone(),
                    result: result.clone().unwrap_or(serde_json::Value::Null),
                });
                content.push(ContentBlock::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    output: result.as_ref().and_then(|v| v.as_str()).map(String::from),
                    is_error: is_error.unwrap_or(false),
                });
            }
            ClaudeContentBlock::Text { text } => {
                content.push(ContentBlock::Text { text: text.clone() });
            }
            _ => {}
        }
    }

    if content.is_empty() {
        return events;
    }

    events.push(ProcessedEvent::Complete {
        role: Role::User,
        content,
        tool_uses: None,
        parent_tool_use_id: user.parent_tool_use_id,
        token_usage: None,
        model_usage: None,
        duration_ms: None,
    });
    events
}

fn decode_stream_event(stream: StreamEventRecord) -> Vec<ProcessedEvent> {
    match stream.event {
        StreamEventBody::ContentBlockDelta { delta } => match delta {
            ContentDelta::TextDelta { text } => vec![ProcessedEvent::Partial {
                text_chunk: text,
                resolved_model: None,
                agent_session_id: None,
            }],
            ContentDelta::ThinkingDelta { thinking } => vec![ProcessedEvent::ThinkingPartial {
                thinking_chunk: thinking,
            }],
            ContentDelta::Unknown => Vec::new(),
        },
        StreamEventBody::ContentBlockStop {} => vec![ProcessedEvent::ThinkingComplete],
        StreamEventBody::Unknown => Vec::new(),
    }
}

fn decode_result(result: ResultRecord, raw: &serde_json::Value) -> Vec<ProcessedEvent> {
    let token_usage = result
        .model_usage
        .as_ref()
        .filter(|usage| !usage.is_empty())
        .map(|per_model| {
            per_model.values().fold(TokenUsage::default(), |mut acc, m| {
                acc.input_tokens += m.input_tokens;
                acc.output_tokens += m.output_tokens;
                acc.cache_read_tokens += m.cache_read_input_tokens;
                acc.cache_creation_tokens += m.cache_creation_input_tokens;
                acc.total_tokens = acc.input_tokens + acc.output_tokens;
                acc
            })
        })
        .or_else(|| result.usage.as_ref().map(usage_to_tokens));

    let model_usage = result.model_usage.as_ref().map(|per_model| ModelUsage {
        per_model: per_model
            .iter()
            .map(|(model, m)| {
                let mut usage =
                    TokenUsage::new(m.input_tokens, m.output_tokens);
                usage.cache_read_tokens = m.cache_read_input_tokens;
                usage.cache_creation_tokens = m.cache_creation_input_tokens;
                (model.clone(), usage)
            })
            .collect(),
    });

    vec![ProcessedEvent::Result {
        raw_sdk_message: raw.clone(),
        token_usage,
        duration_ms: result.duration_ms,
        model_usage,
    }]
}

fn usage_to_tokens(usage: &ClaudeUsage) -> TokenUsage {
    let mut tokens = TokenUsage::new(usage.input_tokens, usage.output_tokens);
    tokens.cache_read_tokens = usage.cache_read_input_tokens;
    tokens.cache_creation_tokens = usage.cache_creation_input_tokens;
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_surfaces_session_id() {
        let raw = json!({"type":"system","subtype":"init","session_id":"sdk-1","model":"claude-sonnet-4-5"});
        let events = decode_event(&raw);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ProcessedEvent::Partial {
                agent_session_id,
                resolved_model,
                ..
            } => {
                assert_eq!(agent_session_id.as_deref(), Some("sdk-1"));
                assert_eq!(resolved_model.as_deref(), Some("claude-sonnet-4-5"));
            }
            other => panic!("expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn test_assistant_with_tool_use() {
        let raw = json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5",
                "content": [
                    {"type": "text", "text": "Let me check."},
                    {"type": "tool_use", "id": "toolu_1", "name": "Bash", "input": {"command": "ls"}}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 4}
            }
        });
        let events = decode_event(&raw);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ProcessedEvent::ToolStart { tool_name, .. } if tool_name == "Bash"
        ));
        match &events[1] {
            ProcessedEvent::Complete {
                role,
                content,
                tool_uses,
                token_usage,
                ..
            } => {
                assert_eq!(*role, Role::Assistant);
                assert_eq!(content.len(), 2);
                assert_eq!(tool_uses.as_ref().unwrap().len(), 1);
                assert_eq!(token_usage.unwrap().total_tokens, 14);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_round() {
        let raw = json!({
            "type": "user",
            "message": {
                "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "ok", "is_error": false}
                ]
            }
        });
        let events = decode_event(&raw);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ProcessedEvent::ToolComplete { tool_use_id, .. } if tool_use_id == "toolu_1"
        ));
    }

    #[test]
    fn test_compact_boundary() {
        let raw = json!({"type":"system","subtype":"compact_boundary","compact_metadata":{"trigger":"auto"}});
        let events = decode_event(&raw);
        assert!(matches!(
            &events[0],
            ProcessedEvent::SystemComplete { system_type, .. } if system_type == "compaction"
        ));
    }

    #[test]
    fn test_result_sums_model_usage() {
        let raw = json!({
            "type": "result",
            "duration_ms": 1500,
            "total_cost_usd": 0.2,
            "modelUsage": {
                "claude-sonnet-4-5": {"inputTokens": 100, "outputTokens": 40, "contextWindow": 200000},
                "claude-haiku-4-5": {"inputTokens": 20, "outputTokens": 10, "contextWindow": 200000}
            }
        });
        let events = decode_event(&raw);
        match &events[0] {
            ProcessedEvent::Result {
                token_usage,
                duration_ms,
                model_usage,
                ..
            } => {
                let usage = token_usage.unwrap();
                assert_eq!(usage.input_tokens, 120);
                assert_eq!(usage.output_tokens, 50);
                assert_eq!(usage.total_tokens, 170);
                assert_eq!(*duration_ms, Some(1500));
                assert_eq!(model_usage.as_ref().unwrap().per_model.len(), 2);
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_dropped() {
        let raw = json!({"type": "telemetry", "data": 42});
        assert!(decode_event(&raw).is_empty());
    }

    #[test]
    fn test_text_delta_partial() {
        let raw = json!({
            "type": "stream_event",
            "event": {"type": "content_block_delta", "delta": {"type": "text_delta", "text": "chunk"}}
        });
        let events = decode_event(&raw);
        assert!(matches!(
            &events[0],
            ProcessedEvent::Partial { text_chunk, .. } if text_chunk == "chunk"
        ));
    }
}
