use crate::opencode::events::decode_event;
use crate::setup::{PromptContext, ResumeDecision, validate_working_dir};
use crate::subprocess::run_jsonl_stream;
use crate::traits::{PermissionGate, PromptDriver, StopHandle};
use agor_types::ProcessedEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

/// Drives the opencode CLI. Fork behaves like a resume of the parent's
/// session id: opencode branches internally and reports the new id in its
/// session banner.
pub struct OpencodeDriver;

fn build_command(ctx: &PromptContext) -> Command {
    let mut cmd = Command::new("opencode");
    cmd.arg("run").arg("--print-logs");
    cmd.args(["--model", ctx.model.as_str()]);

    match &ctx.resume {
        ResumeDecision::Fresh => {}
        ResumeDecision::Resume { sdk_session_id }
        | ResumeDecision::Fork {
            parent_sdk_session_id: sdk_session_id,
        } => {
            cmd.args(["--session", sdk_session_id.as_str()]);
        }
    }

    cmd.arg(&ctx.prompt);
    cmd.envs(&ctx.env);
    cmd.current_dir(&ctx.working_dir);
    cmd
}

#[async_trait]
impl PromptDriver for OpencodeDriver {
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
            "starting opencode turn"
        );

        let command = build_command(&ctx);
        run_jsonl_stream(command, decode_event, gate, stop, events).await
    }
}
