use crate::opencode::schema::OpencodeRecord;
use agor_types::{ContentBlock, ProcessedEvent, Role};
use tracing::debug;

/// Decode one opencode log record. Token accounting is not available on
/// this surface, so `Result` carries the raw record only and the
/// normalizer registry returns `None` for this tool.
pub fn decode_event(raw: &serde_json::Value) -> Vec<ProcessedEvent> {
    let record: OpencodeRecord = match serde_json::from_value(raw.clone()) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "undecodable opencode event dropped");
            return Vec::new();
        }
    };

    match record {
        OpencodeRecord::SessionStart { session_id, model } => vec![ProcessedEvent::Partial {
            text_chunk: String::new(),
            resolved_model: model,
            agent_session_id: session_id,
        }],
        OpencodeRecord::Text { text } => vec![ProcessedEvent::Partial {
            text_chunk: text,
            resolved_model: None,
            agent_session_id: None,
        }],
        OpencodeRecord::Reasoning { text } => vec![ProcessedEvent::ThinkingPartial {
            thinking_chunk: text,
        }],
        OpencodeRecord::ToolStart { id, name, input } => vec![ProcessedEvent::ToolStart {
            tool_name: name,
            tool_use_id: id,
            input,
        }],
        OpencodeRecord::ToolEnd { id, output } => vec![ProcessedEvent::ToolComplete {
            tool_use_id: id,
            result: output,
        }],
        OpencodeRecord::Done { message } => {
            let mut events = Vec::new();
            if let Some(text) = message.filter(|m| !m.is_empty()) {
                events.push(ProcessedEvent::Complete {
                    role: Role::Assistant,
                    content: vec![ContentBlock::Text { text }],
                    tool_uses: None,
                    parent_tool_use_id: None,
                    token_usage: None,
                    model_usage: None,
                    duration_ms: None,
                });
            }
            events.push(ProcessedEvent::Result {
                raw_sdk_message: raw.clone(),
                token_usage: None,
                duration_ms: None,
                model_usage: None,
            });
            events
        }
        OpencodeRecord::Unknown => {
            debug!("unknown opencode event type dropped");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_done_emits_complete_and_result() {
        let events = decode_event(&json!({"type": "done", "message": "finished"}));
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ProcessedEvent::Complete { .. }));
        assert!(matches!(&events[1], ProcessedEvent::Result { .. }));
    }

    #[test]
    fn test_unknown_dropped() {
        assert!(decode_event(&json!({"type": "heartbeat"})).is_empty());
    }
}
