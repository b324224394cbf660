use crate::gemini::events::decode_response;
use crate::gemini::schema::*;
use crate::gemini::tools::{BuiltinToolExecutor, ToolExecutor};
use crate::setup::{PromptContext, validate_working_dir};
use crate::traits::{PermissionGate, PromptDriver, StopHandle, VendorError};
use agor_types::{PermissionVerdict, ProcessedEvent, SessionId};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Host-side tool loops per turn. Hitting the cap logs and ends the turn
/// cleanly; it is a runaway guard, not a failure.
const MAX_TOOL_LOOPS: u32 = 50;

/// Deadline for the first request of a turn. A timeout here is an auth
/// handshake problem and is surfaced as such, distinct from a rejected key.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives the Gemini generateContent API with host-executed tools.
///
/// Unlike the subprocess vendors, Gemini expects the caller to run tools:
/// each finished turn may carry function calls which are gated, executed,
/// and echoed back as the next turn's input.
pub struct GeminiDriver;

/// Per-session context file handed to the model as system instruction
pub fn context_file_path(session_id: SessionId) -> PathBuf {
    std::env::temp_dir().join(format!("agor-gemini-{session_id}.md"))
}

/// Best-effort cleanup, called when a session closes
pub fn remove_context_file(session_id: SessionId) {
    let path = context_file_path(session_id);
    if let Err(e) = std::fs::remove_file(&path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove gemini context file");
    }
}

fn render_system_prompt(ctx: &PromptContext) -> String {
    format!(
        "You are an autonomous coding agent operating inside the worktree at {}.\n\
         Use the provided tools for every filesystem or shell action.\n\
         Session: {}\n",
        ctx.working_dir.display(),
        ctx.session.session_id,
    )
}

fn write_context_file(ctx: &PromptContext) -> Result<PathBuf> {
    use std::io::Write;
    let path = context_file_path(ctx.session.session_id);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&path)?;
    file.write_all(render_system_prompt(ctx).as_bytes())?;
    Ok(path)
}

fn resolve_api_key(ctx: &PromptContext) -> Result<String> {
    if let Some(key) = ctx.env.get("GEMINI_API_KEY") {
        return Ok(key.clone());
    }
    std::env::var("GEMINI_API_KEY")
        .map_err(|_| VendorError::Unauthenticated("GEMINI_API_KEY is not set".into()).into())
}

async fn generate(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    request: &GenerateRequest,
    first_call: bool,
) -> Result<GenerateResponse> {
    let url = format!("{API_BASE}/{model}:generateContent");
    let send = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(request)
        .send();

    let response = if first_call {
        match tokio::time::timeout(AUTH_TIMEOUT, send).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(
                    VendorError::AuthTimeout("gemini auth handshake exceeded 10s".into()).into(),
                );
            }
        }
    } else {
        send.await?
    };

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(VendorError::Unauthenticated(body).into());
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(VendorError::Sdk {
            message: format!("gemini returned {status}"),
            stderr: body,
        }
        .into());
    }

    Ok(response.json().await?)
}

#[async_trait]
impl PromptDriver for GeminiDriver {
    async fn prompt_session_streaming(
        &self,
        ctx: PromptContext,
        gate: Arc<dyn PermissionGate>,
        stop: StopHandle,
        events: mpsc::Sender<ProcessedEvent>,
    ) -> Result<()> {
        validate_working_dir(&ctx.working_dir)?;
        let api_key = resolve_api_key(&ctx)?;
        write_context_file(&ctx)?;
        info!(
            session = %ctx.session.session_id,
            task = %ctx.task_id,
            model = %ctx.model,
            "starting gemini turn"
        );

        let executor = BuiltinToolExecutor::new(&ctx.working_dir);
        let client = reqwest::Client::new();
        let system = Content {
            role: None,
            parts: vec![Part::text(render_system_prompt(&ctx))],
        };
        let generation_config = ctx.thinking_budget.tokens().map(|budget| GenerationConfig {
            thinking_config: Some(ThinkingConfig {
                thinking_budget: budget as i64,
            }),
        });

        let mut contents = vec![Content {
            role: Some("user".into()),
            parts: vec![Part::text(&ctx.prompt)],
        }];
        let mut call_seq = 0u64;
        let mut last_usage: Option<UsageMetadata> = None;
        let mut model_version: Option<String> = None;

        for loop_index in 0..MAX_TOOL_LOOPS {
            if stop.is_stopped() {
                let _ = events.send(ProcessedEvent::Stopped).await;
                return Ok(());
            }

            let request = GenerateRequest {
                contents: contents.clone(),
                system_instruction: Some(system.clone()),
                tools: executor.declarations(),
                generation_config: generation_config.clone(),
            };

            let response = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    let _ = events.send(ProcessedEvent::Stopped).await;
                    return Ok(());
                }
                result = generate(&client, &api_key, &ctx.model, &request, loop_index == 0) => result?,
            };

            if let Some(meta) = response.usage_metadata {
                last_usage = Some(meta);
            }
            if model_version.is_none() {
                model_version = response.model_version.clone();
            }

            let decoded = decode_response(&response, &mut call_seq);
            for event in &decoded.events {
                if let ProcessedEvent::ToolStart {
                    tool_name,
                    tool_use_id,
                    input,
                } = event
                {
                    match gate.check(tool_name, input, tool_use_id).await? {
                        PermissionVerdict::Allow => {}
                        PermissionVerdict::Deny { reason } => {
                            return Err(crate::subprocess::PermissionDeniedError {
                                tool_name: tool_name.clone(),
                                reason,
                            }
                            .into());
                        }
                    }
                }
                if events.send(event.clone()).await.is_err() {
                    return Ok(());
                }
            }

            if decoded.function_calls.is_empty() {
                let result = GeminiResult {
                    model_version,
                    usage_metadata: last_usage,
                    tool_loops: loop_index,
                };
                let _ = events
                    .send(ProcessedEvent::Result {
                        raw_sdk_message: serde_json::to_value(&result)
                            .unwrap_or(serde_json::Value::Null),
                        token_usage: None,
                        duration_ms: None,
                        model_usage: None,
                    })
                    .await;
                return Ok(());
            }

            // Echo the model's own turn, then execute each requested tool
            // and hand the responses back as the next user turn
            if let Some(candidate) = response.candidates.first()
                && let Some(model_content) = &candidate.content
            {
                contents.push(model_content.clone());
            }

            let mut response_parts = Vec::new();
            for (call_id, call) in &decoded.function_calls {
                if stop.is_stopped() {
                    let _ = events.send(ProcessedEvent::Stopped).await;
                    return Ok(());
                }
                let result = match executor.execute(&call.name, &call.args).await {
                    Ok(value) => value,
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                let _ = events
                    .send(ProcessedEvent::ToolComplete {
                        tool_use_id: call_id.clone(),
                        result: result.clone(),
                    })
                    .await;
                response_parts.push(Part::function_response(&call.name, result));
            }
            contents.push(Content {
                role: Some("user".into()),
                parts: response_parts,
            });
        }

        // Cap reached: end the turn cleanly with whatever usage we have
        warn!(
            session = %ctx.session.session_id,
            cap = MAX_TOOL_LOOPS,
            "gemini tool loop cap reached; terminating turn"
        );
        let result = GeminiResult {
            model_version,
            usage_metadata: last_usage,
            tool_loops: MAX_TOOL_LOOPS,
        };
        let _ = events
            .send(ProcessedEvent::Result {
                raw_sdk_message: serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
                token_usage: None,
                duration_ms: None,
                model_usage: None,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agor_types::SessionId;

    #[test]
    fn test_context_file_path_is_per_session() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(context_file_path(a), context_file_path(b));
        assert!(
            context_file_path(a)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("agor-gemini-")
        );
    }

    #[test]
    fn test_remove_missing_context_file_is_silent() {
        remove_context_file(SessionId::new());
    }
}
