use crate::claude::events::decode_event;
use crate::mcp_format::to_mcp_servers_config;
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

/// Drives the Claude Code CLI in stream-json mode, one turn per prompt.
///
/// Resume, fork and fresh starts map onto `--resume`/`--fork-session`; the
/// thinking budget travels through the `MAX_THINKING_TOKENS` environment
/// variable the CLI honors. Interrupts are process kills — the CLI persists
/// its own session file on the way down, so a later resume still works.
pub struct ClaudeDriver;

fn vendor_permission_mode(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Ask => "default",
        PermissionMode::AcceptEdits => "acceptEdits",
        PermissionMode::Plan => "plan",
        PermissionMode::Bypass => "bypassPermissions",
    }
}

fn build_command(ctx: &PromptContext) -> Command {
    let mut cmd = Command::new("claude");
    cmd.arg("-p")
        .arg(&ctx.prompt)
        .args(["--output-format", "stream-json"])
        .arg("--verbose")
        .arg("--include-partial-messages")
        .args(["--permission-mode", vendor_permission_mode(ctx.permission_mode)])
        .args(["--model", ctx.model.as_str()]);

    match &ctx.resume {
        ResumeDecision::Fresh => {}
        ResumeDecision::Resume { sdk_session_id } => {
            cmd.args(["--resume", sdk_session_id.as_str()]);
        }
        ResumeDecision::Fork {
            parent_sdk_session_id,
        } => {
            // The vendor mints a fresh id for the fork; the parent's
            // conversation is left untouched.
            cmd.args(["--resume", parent_sdk_session_id.as_str()]);
            cmd.arg("--fork-session");
        }
    }

    if !ctx.mcp.servers.is_empty() {
        let config = to_mcp_servers_config(&ctx.mcp).to_string();
        cmd.args(["--mcp-config", config.as_str()]);
        if !ctx.mcp.allowed_tools.is_empty() {
            let allowed = ctx.mcp.allowed_tools.join(",");
            cmd.args(["--allowed-tools", allowed.as_str()]);
        }
    }

    if let Some(tokens) = ctx.thinking_budget.tokens() {
        cmd.env("MAX_THINKING_TOKENS", tokens.to_string());
    }

    cmd.envs(&ctx.env);
    cmd.current_dir(&ctx.working_dir);
    cmd
}

#[async_trait]
impl PromptDriver for ClaudeDriver {
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
            resume = ?ctx.resume,
            "starting claude turn"
        );

        let command = build_command(&ctx);
        run_jsonl_stream(command, decode_event, gate, stop, events).await
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
            session: Session::new(AgenticTool::ClaudeCode, "tester"),
            task_id: TaskId::new(),
            prompt: "hello".into(),
            model: "claude-sonnet-4-5".into(),
            permission_mode: PermissionMode::Ask,
            working_dir: PathBuf::from("/tmp"),
            thinking_budget: ThinkingBudget::Disabled,
            mcp: McpMergeResult::default(),
            resume,
            env: Default::default(),
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fresh_has_no_resume() {
        let cmd = build_command(&ctx(ResumeDecision::Fresh));
        let args = args_of(&cmd);
        assert!(!args.iter().any(|a| a == "--resume"));
        assert!(!args.iter().any(|a| a == "--fork-session"));
    }

    #[test]
    fn test_fork_resumes_parent_with_flag() {
        let cmd = build_command(&ctx(ResumeDecision::Fork {
            parent_sdk_session_id: "a0".into(),
        }));
        let args = args_of(&cmd);
        let resume_idx = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[resume_idx + 1], "a0");
        assert!(args.iter().any(|a| a == "--fork-session"));
    }

    #[test]
    fn test_resume_own_session() {
        let cmd = build_command(&ctx(ResumeDecision::Resume {
            sdk_session_id: "own".into(),
        }));
        let args = args_of(&cmd);
        let resume_idx = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[resume_idx + 1], "own");
        assert!(!args.iter().any(|a| a == "--fork-session"));
    }

    #[test]
    fn test_thinking_budget_env() {
        let mut context = ctx(ResumeDecision::Fresh);
        context.thinking_budget = ThinkingBudget::Tokens(10_000);
        let cmd = build_command(&context);
        let envs: Vec<_> = cmd
            .as_std()
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_string_lossy().into_owned(), v?.to_string_lossy().into_owned())))
            .collect();
        assert!(envs.contains(&("MAX_THINKING_TOKENS".into(), "10000".into())));
    }
}
