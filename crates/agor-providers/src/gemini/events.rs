use crate::gemini::schema::{FunctionCall, GenerateResponse};
use agor_types::{ContentBlock, ProcessedEvent, Role, ToolUseRef};

/// Decoded view of one finished Gemini turn: the events to surface plus the
/// function calls the host must execute before the loop can continue.
pub struct DecodedTurn {
    pub events: Vec<ProcessedEvent>,
    pub function_calls: Vec<(String, FunctionCall)>,
}

/// Decode a finished generateContent response.
///
/// Text parts become one `Partial` each (the API returns whole spans, not
/// token deltas) followed by a single `Complete`; thought parts map to the
/// thinking stream; function calls surface as `ToolStart`s and are returned
/// separately for host execution. Call ids are synthesized (`call-N` within
/// the turn) since Gemini does not assign them.
pub fn decode_response(response: &GenerateResponse, call_seq: &mut u64) -> DecodedTurn {
    let mut events = Vec::new();
    let mut function_calls = Vec::new();
    let mut content = Vec::new();
    let mut tool_uses = Vec::new();
    let mut saw_thought = false;

    for candidate in &response.candidates {
        let Some(candidate_content) = &candidate.content else {
            continue;
        };
        for part in &candidate_content.parts {
            if let Some(text) = &part.text {
                if part.thought.unwrap_or(false) {
                    saw_thought = true;
                    events.push(ProcessedEvent::ThinkingPartial {
                        thinking_chunk: text.clone(),
                    });
                    content.push(ContentBlock::Thinking {
                        thinking: text.clone(),
                    });
                } else {
                    events.push(ProcessedEvent::Partial {
                        text_chunk: text.clone(),
                        resolved_model: response.model_version.clone(),
                        agent_session_id: None,
                    });
                    content.push(ContentBlock::Text { text: text.clone() });
                }
            }
            if let Some(call) = &part.function_call {
                *call_seq += 1;
                let call_id = format!("call-{call_seq}");
                events.push(ProcessedEvent::ToolStart {
                    tool_name: call.name.clone(),
                    tool_use_id: call_id.clone(),
                    input: call.args.clone(),
                });
                tool_uses.push(ToolUseRef {
                    tool_use_id: call_id.clone(),
                    tool_name: call.name.clone(),
                });
                content.push(ContentBlock::ToolUse {
                    tool_use_id: call_id.clone(),
                    tool_name: call.name.clone(),
                    input: call.args.clone(),
                });
                function_calls.push((call_id, call.clone()));
            }
        }
    }

    if saw_thought {
        events.push(ProcessedEvent::ThinkingComplete);
    }

    if !content.is_empty() {
        let token_usage = response.usage_metadata.map(|meta| {
            let output =
                meta.candidates_token_count + meta.thoughts_token_count.unwrap_or(0);
            let mut usage = agor_types::TokenUsage::new(meta.prompt_token_count, output);
            usage.cache_read_tokens = meta.cached_content_token_count.unwrap_or(0);
            usage
        });
        events.push(ProcessedEvent::Complete {
            role: Role::Assistant,
            content,
            tool_uses: if tool_uses.is_empty() {
                None
            } else {
                Some(tool_uses)
            },
            parent_tool_use_id: None,
            token_usage,
            model_usage: None,
            duration_ms: None,
        });
    }

    DecodedTurn {
        events,
        function_calls,
    }
}
