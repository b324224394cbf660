use crate::codex::events::CodexEventDecoder;
use crate::setup::{PromptContext, ResumeDecision, validate_working_dir};
use crate::subprocess::run_jsonl_stream;
use crate::traits::{PermissionGate, PromptDriver, StopHandle};
use agor_types::{PermissionMode, ProcessedEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

/// Drives `codex exec --json`. Forking is expressed the same way as a
/// resume: codex re-reads the referenced rollout and then writes a new one,
/// so the parent session file is never mutated.
pub struct CodexDriver;

fn sandbox_mode(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Bypass => "danger-full-access",
        PermissionMode::AcceptEdits => "workspace-write",
        PermissionMode::Ask | PermissionMode::Plan => "read-only",
    }
}

fn build_command(ctx: &PromptContext) -> Command {
    let mut cmd = Command::new("codex");
    cmd.arg("exec").arg("--json");
    cmd.args(["--model", ctx.model.as_str()]);
    cmd.args(["--sandbox", sandbox_mode(ctx.permission_mode)]);
    cmd.arg("--cd").arg(ctx.working_dir.as_os_str());

    match &ctx.resume {
        ResumeDecision::Fresh => {}
        ResumeDecision::Resume { sdk_session_id }
        | ResumeDecision::Fork {
            parent_sdk_session_id: sdk_session_id,
        } => {
            cmd.args(["resume", sdk_session_id.as_str()]);
        }
    }

    cmd.arg(&ctx.prompt);
    cmd.envs(&ctx.env);
    cmd.current_dir(&ctx.working_dir);
    cmd
}

#[async_trait]
impl PromptDriver for CodexDriver {
    async fn prompt_session_streaming(
        &self,
        ctx: PromptContext,
        gate: Arc<dyn PermissionGate>,
        stop: StopHandle,
        events: mpsc::Sender<ProcessedEvent>,
    ) -> Result<()> {
        validate_working_dir(&ctx.working_dir)?;
        info!(
            session = %ctx.session.session_id,
            task = %ctx.task_id,
            model = %ctx.model,
            "starting codex turn"
        );

        let command = build_command(&ctx);
        let mut decoder = CodexEventDecoder::new();
        run_jsonl_stream(command, |raw| decoder.decode(raw), gate, stop, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thinking::ThinkingBudget;
    use agor_types::{AgenticTool, McpMergeResult, Session, TaskId};
    use std::path::PathBuf;

    fn ctx(resume: ResumeDecision) -> PromptContext {
        PromptContext {
            session: Session::new(AgenticTool::Codex, "tester"),
            task_id: TaskId::new(),
            prompt: "hello".into(),
            model: "gpt-5-codex".into(),
            permission_mode: PermissionMode::Ask,
            working_dir: PathBuf::from("/tmp"),
            thinking_budget: ThinkingBudget::Disabled,
            mcp: McpMergeResult::default(),
            resume,
            env: Default::default(),
        }
    }

    #[test]
    fn test_resume_includes_rollout_id() {
        let cmd = build_command(&ctx(ResumeDecision::Resume {
            sdk_session_id: "rollout-1".into(),
        }));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w[0] == "resume" && w[1] == "rollout-1"));
    }

    #[test]
    fn test_ask_mode_is_read_only_sandbox() {
        assert_eq!(sandbox_mode(PermissionMode::Ask), "read-only");
        assert_eq!(sandbox_mode(PermissionMode::Bypass), "danger-full-access");
    }
}
