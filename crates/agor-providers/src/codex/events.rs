use crate::codex::schema::*;
use agor_types::{ContentBlock, ProcessedEvent, Role};
use serde_json::json;
use tracing::debug;

/// Stateful decoder for the codex event stream.
///
/// Codex never emits a single result record: the vendor session id arrives
/// in the opening banner and token totals drip in through `token_count`
/// events. The decoder remembers both and synthesizes a `Result` when
/// `task_complete` lands.
#[derive(Default)]
pub struct CodexEventDecoder {
    session_id: Option<String>,
    model: Option<String>,
    last_usage: Option<CodexTokenUsage>,
    started_at: Option<std::time::Instant>,
}

impl CodexEventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, raw: &serde_json::Value) -> Vec<ProcessedEvent> {
        let envelope: CodexEnvelope = match serde_json::from_value(raw.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "undecodable codex event dropped");
                return Vec::new();
            }
        };

        match envelope.msg {
            CodexMsg::SessionConfigured { session_id, model } => {
                self.session_id = session_id.clone();
                self.model = model.clone();
                vec![ProcessedEvent::Partial {
                    text_chunk: String::new(),
                    resolved_model: model,
                    agent_session_id: session_id,
                }]
            }
            CodexMsg::TaskStarted {} => {
                self.started_at = Some(std::time::Instant::now());
                Vec::new()
            }
            CodexMsg::AgentMessageDelta { delta } => vec![ProcessedEvent::Partial {
                text_chunk: delta,
                resolved_model: None,
                agent_session_id: None,
            }],
            CodexMsg::AgentMessage { message } => vec![ProcessedEvent::Complete {
                role: Role::Assistant,
                content: vec![ContentBlock::Text { text: message }],
                tool_uses: None,
                parent_tool_use_id: None,
                token_usage: None,
                model_usage: None,
                duration_ms: None,
            }],
            CodexMsg::AgentReasoningDelta { delta } => vec![ProcessedEvent::ThinkingPartial {
                thinking_chunk: delta,
            }],
            CodexMsg::AgentReasoning { .. } => vec![ProcessedEvent::ThinkingComplete],
            CodexMsg::ExecCommandBegin {
                call_id,
                command,
                cwd,
            } => vec![ProcessedEvent::ToolStart {
                tool_name: "shell".to_string(),
                tool_use_id: call_id,
                input: json!({ "command": command, "cwd": cwd }),
            }],
            CodexMsg::ExecCommandEnd {
                call_id,
                stdout,
                stderr,
                exit_code,
            } => vec![ProcessedEvent::ToolComplete {
                tool_use_id: call_id,
                result: json!({ "stdout": stdout, "stderr": stderr, "exit_code": exit_code }),
            }],
            CodexMsg::McpToolCallBegin {
                call_id,
                server,
                tool,
                arguments,
            } => {
                let tool_name = match (server, tool) {
                    (Some(server), Some(tool)) => format!("mcp__{server}__{tool}"),
                    (_, Some(tool)) => tool,
                    _ => "mcp".to_string(),
                };
                vec![ProcessedEvent::ToolStart {
                    tool_name,
                    tool_use_id: call_id,
                    input: arguments,
                }]
            }
            CodexMsg::McpToolCallEnd { call_id, result } => vec![ProcessedEvent::ToolComplete {
                tool_use_id: call_id,
                result,
            }],
            CodexMsg::TokenCount { info } => {
                if let Some(total) = info.and_then(|i| i.total_token_usage) {
                    self.last_usage = Some(total);
                }
                Vec::new()
            }
            CodexMsg::TaskComplete { last_agent_message } => {
                let result = CodexResult {
                    session_id: self.session_id.clone(),
                    model: self.model.clone(),
                    total_token_usage: self.last_usage,
                    last_agent_message,
                };
                let duration_ms = self
                    .started_at
                    .map(|start| start.elapsed().as_millis() as u64);
                vec![ProcessedEvent::Result {
                    raw_sdk_message: serde_json::to_value(&result)
                        .unwrap_or(serde_json::Value::Null),
                    token_usage: None,
                    duration_ms,
                    model_usage: None,
                }]
            }
            CodexMsg::Error { message } => {
                debug!(message = %message, "codex error event");
                Vec::new()
            }
            CodexMsg::Unknown => {
                debug!("unknown codex event type dropped");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut CodexEventDecoder, lines: &[serde_json::Value]) -> Vec<ProcessedEvent> {
        lines.iter().flat_map(|raw| decoder.decode(raw)).collect()
    }

    #[test]
    fn test_session_banner_then_result_carries_totals() {
        let mut decoder = CodexEventDecoder::new();
        let events = decode_all(&mut decoder, &[
            json!({"id":"0","msg":{"type":"session_configured","session_id":"cx-1","model":"gpt-5-codex"}}),
            json!({"id":"1","msg":{"type":"token_count","info":{"total_token_usage":{"input_tokens":100,"output_tokens":30,"total_tokens":130}}}}),
            json!({"id":"1","msg":{"type":"task_complete","last_agent_message":"done"}}),
        ]);

        assert!(matches!(
            &events[0],
            ProcessedEvent::Partial { agent_session_id: Some(id), .. } if id == "cx-1"
        ));
        match events.last().unwrap() {
            ProcessedEvent::Result { raw_sdk_message, .. } => {
                assert_eq!(raw_sdk_message["session_id"], "cx-1");
                assert_eq!(raw_sdk_message["total_token_usage"]["input_tokens"], 100);
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn test_exec_command_maps_to_tool_events() {
        let mut decoder = CodexEventDecoder::new();
        let begin = decoder.decode(&json!({
            "id":"1","msg":{"type":"exec_command_begin","call_id":"c1","command":["bash","-lc","ls"]}
        }));
        assert!(matches!(
            &begin[0],
            ProcessedEvent::ToolStart { tool_name, tool_use_id, .. }
                if tool_name == "shell" && tool_use_id == "c1"
        ));

        let end = decoder.decode(&json!({
            "id":"1","msg":{"type":"exec_command_end","call_id":"c1","stdout":"ok","exit_code":0}
        }));
        assert!(matches!(&end[0], ProcessedEvent::ToolComplete { tool_use_id, .. } if tool_use_id == "c1"));
    }

    #[test]
    fn test_mcp_tool_name_prefixed() {
        let mut decoder = CodexEventDecoder::new();
        let events = decoder.decode(&json!({
            "id":"1","msg":{"type":"mcp_tool_call_begin","call_id":"m1","server":"docs","tool":"search","arguments":{}}
        }));
        assert!(matches!(
            &events[0],
            ProcessedEvent::ToolStart { tool_name, .. } if tool_name == "mcp__docs__search"
        ));
    }
}
