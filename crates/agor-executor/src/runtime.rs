use crate::permission::ExecutorGate;
use crate::settings::load_project_permissions;
use agor_providers::{
    CancelledError, NormalizeContext, PermissionDeniedError, PromptContext, StopHandle,
    ToolAdapter, VendorError, compute_context_window, current_turn_fresh_tokens,
    resolve_resume, resolve_thinking_budget, resolve_working_dir, TASK_SCAN_WINDOW,
};
use agor_sdk::Client;
use agor_types::{
    AgenticTool, ContentBlock, Message, MessageMetadata, MessageTokens, ModelUsage,
    PermissionDecision, PermissionMode, ProcessedEvent, Role, Session, SessionId, SessionPatch,
    SessionStatus, TaskId, TaskPatch, TaskStatus, TokenUsage, channels, session_channel,
    message_channel,
};
use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ExecutorArgs {
    pub daemon_url: String,
    pub session_token: String,
    pub session_id: SessionId,
    pub task_id: TaskId,
    pub tool: AgenticTool,
    pub prompt: String,
    pub permission_mode: Option<PermissionMode>,
    pub cwd: Option<std::path::PathBuf>,
    /// Extra environment for vendor subprocesses (user-config wins over
    /// the inherited process env)
    pub env: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Stopped,
    Failed(String),
    /// Vendor credential problem; the CLI wrapper exits 2
    Unauthenticated(String),
}

impl TaskOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskOutcome::Completed | TaskOutcome::Stopped => 0,
            TaskOutcome::Failed(_) => 1,
            TaskOutcome::Unauthenticated(_) => 2,
        }
    }
}

/// One-prompt executor. Connect → subscribe → drive → persist → exit.
pub struct ExecutorRuntime {
    client: Client,
    args: ExecutorArgs,
    session: Session,
    stop: StopHandle,
}

impl ExecutorRuntime {
    pub async fn connect(args: ExecutorArgs) -> Result<Self> {
        let client = Client::connect(&args.daemon_url, &args.session_token).await?;
        let session = client.get_session(args.session_id).await?;
        Ok(Self {
            client,
            args,
            session,
            stop: StopHandle::new(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Drive the whole prompt to a terminal state. Every failure path
    /// lands in the returned outcome; the caller only maps it to an exit
    /// code.
    pub async fn run(mut self) -> TaskOutcome {
        match self.run_inner().await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.downcast_ref::<CancelledError>().is_some() {
                    self.finish_stopped().await;
                    return TaskOutcome::Stopped;
                }
                if let Some(denied) = e.downcast_ref::<PermissionDeniedError>() {
                    let reason = denied.to_string();
                    self.finish_failed(&reason).await;
                    return TaskOutcome::Failed(reason);
                }
                match e.downcast_ref::<VendorError>() {
                    Some(VendorError::Unauthenticated(msg)) => {
                        let msg = msg.clone();
                        self.finish_failed(&format!("vendor authentication failed: {msg}"))
                            .await;
                        return TaskOutcome::Unauthenticated(msg);
                    }
                    Some(_) | None => {}
                }
                if self.stop.is_stopped() {
                    self.finish_stopped().await;
                    return TaskOutcome::Stopped;
                }
                let reason = format!("{e:#}");
                self.finish_failed(&reason).await;
                TaskOutcome::Failed(reason)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<TaskOutcome> {
        let args = self.args.clone();
        let session = self.session.clone();

        // Control plane: stop signals and permission replies arrive on the
        // session channel; the message channel subscription completes the
        // executor contract (observers count us as a session participant).
        let mut session_events = self
            .client
            .subscribe(&session_channel(session.session_id))
            .await?;
        let _message_events = self
            .client
            .subscribe(&message_channel(session.session_id))
            .await?;

        let worktree = match session.worktree_id {
            Some(worktree_id) => match self.client.get_worktree(worktree_id).await {
                Ok(worktree) => Some(worktree),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let worktree_path = worktree.as_ref().map(|w| w.path.clone());
        let working_dir = resolve_working_dir(args.cwd.as_deref(), worktree_path.as_deref());

        let permission_mode = args
            .permission_mode
            .unwrap_or(session.permission_config.mode);
        let (project_allowed, project_denied) = match &worktree_path {
            Some(path) => load_project_permissions(path),
            None => Default::default(),
        };

        let gate = Arc::new(ExecutorGate::new(
            self.client.clone(),
            session.session_id,
            args.task_id,
            permission_mode,
            session.permission_config.allowed_tools.clone(),
            project_allowed,
            project_denied,
            worktree_path.clone(),
            self.stop.clone(),
        ));

        // Fan control events into the gate / stop handle
        let control_gate = gate.clone();
        let control_stop = self.stop.clone();
        let control_client = self.client.clone();
        let control_session = session.session_id;
        let control_task = args.task_id;
        tokio::spawn(async move {
            while let Some((event, payload, _seq)) = session_events.recv().await {
                match event.as_str() {
                    channels::events::TASK_STOP => {
                        let matches = payload
                            .get("task_id")
                            .and_then(|v| v.as_str())
                            .map(|id| id == control_task.to_string())
                            .unwrap_or(false);
                        if matches {
                            let sequence = payload
                                .get("sequence")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0);
                            // Ack first, then begin shutdown
                            let _ = control_client
                                .ack_stop(control_session, control_task, sequence)
                                .await;
                            control_stop.stop();
                        }
                    }
                    channels::events::PERMISSION_RESOLVED => {
                        if let Ok(decision) =
                            serde_json::from_value::<PermissionDecision>(payload)
                        {
                            control_gate.resolve(decision).await;
                        }
                    }
                    _ => {}
                }
            }
        });

        let mcp = self.client.mcp_servers(session.session_id).await?;
        let parent_sdk_session_id = match session.genealogy.forked_from_session_id {
            Some(parent_id) => match self.client.get_session(parent_id).await {
                Ok(parent) => parent.sdk_session_id,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let worktree_exists = worktree_path.as_deref().map(|p| p.is_dir()).unwrap_or(true);
        let resume = resolve_resume(
            &session,
            parent_sdk_session_id.as_deref(),
            worktree_exists,
            mcp.newest_addition,
            Utc::now(),
        );
        if session.sdk_session_id.is_some() && resume == agor_providers::ResumeDecision::Fresh {
            // Stale continuation token: clear it so observers see the
            // fresh start even if this turn never completes
            self.client
                .patch_session(session.session_id, SessionPatch {
                    sdk_session_id: Some(None),
                    ..Default::default()
                })
                .await
                .map(|_| ())
                .or_else(swallow_not_found)?;
        }

        let task = self.client.get_task(args.task_id).await?;
        let model = task
            .model
            .clone()
            .or_else(|| session.model_config.model.clone())
            .unwrap_or_else(|| "claude-sonnet-4-5".to_string());
        let thinking_budget = resolve_thinking_budget(&session.model_config, &args.prompt);

        self.client
            .patch_task(args.task_id, TaskPatch {
                status: Some(TaskStatus::Running),
                model: Some(model.clone()),
                ..Default::default()
            })
            .await?;

        let ctx = PromptContext {
            session: session.clone(),
            task_id: args.task_id,
            prompt: args.prompt.clone(),
            model,
            permission_mode,
            working_dir,
            thinking_budget,
            mcp,
            resume,
            env: args.env.clone(),
        };

        let adapter = ToolAdapter::for_tool(args.tool);
        let (event_tx, event_rx) = mpsc::channel(64);
        let driver_stop = self.stop.clone();
        let driver_gate = gate.clone();
        let driver = tokio::spawn(async move {
            adapter
                .driver
                .prompt_session_streaming(ctx, driver_gate, driver_stop, event_tx)
                .await
        });

        let mut turn = TurnState::default();
        self.consume_events(event_rx, &mut turn).await?;

        match driver.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(join_err) => anyhow::bail!("driver task panicked: {join_err}"),
        }

        if turn.stopped || self.stop.is_stopped() {
            self.finish_stopped().await;
            return Ok(TaskOutcome::Stopped);
        }

        self.finish_completed(&turn).await?;
        Ok(TaskOutcome::Completed)
    }

    async fn consume_events(
        &self,
        mut events: mpsc::Receiver<ProcessedEvent>,
        turn: &mut TurnState,
    ) -> Result<()> {
        let session_id = self.session.session_id;
        let task_id = self.args.task_id;

        while let Some(event) = events.recv().await {
            match event {
                ProcessedEvent::Partial {
                    text_chunk,
                    resolved_model,
                    agent_session_id,
                } => {
                    if let Some(id) = agent_session_id {
                        turn.agent_session_id = Some(id);
                    }
                    if let Some(model) = resolved_model {
                        turn.resolved_model = Some(model);
                    }
                    if text_chunk.is_empty() {
                        continue;
                    }
                    if turn.streaming_message.is_none() {
                        let message = self
                            .guarded_create_message(
                                Role::Assistant,
                                vec![ContentBlock::text(&text_chunk)],
                                None,
                                None,
                            )
                            .await?;
                        if let Some(message) = &message {
                            self.client
                                .stream_event(
                                    session_id,
                                    channels::events::STREAMING_START,
                                    json!({ "message_id": message.message_id, "task_id": task_id }),
                                )
                                .await
                                .ok();
                        }
                        turn.streaming_message = message;
                    }
                    self.client
                        .stream_event(
                            session_id,
                            channels::events::STREAMING_CHUNK,
                            json!({ "task_id": task_id, "chunk": text_chunk }),
                        )
                        .await
                        .ok();
                }
                ProcessedEvent::ThinkingPartial { thinking_chunk } => {
                    if !turn.thinking_open {
                        turn.thinking_open = true;
                        self.client
                            .stream_event(
                                session_id,
                                channels::events::THINKING_START,
                                json!({ "task_id": task_id }),
                            )
                            .await
                            .ok();
                    }
                    self.client
                        .stream_event(
                            session_id,
                            channels::events::THINKING_CHUNK,
                            json!({ "task_id": task_id, "chunk": thinking_chunk }),
                        )
                        .await
                        .ok();
                }
                ProcessedEvent::ThinkingComplete => {
                    if turn.thinking_open {
                        turn.thinking_open = false;
                        self.client
                            .stream_event(
                                session_id,
                                channels::events::THINKING_END,
                                json!({ "task_id": task_id }),
                            )
                            .await
                            .ok();
                    }
                }
                ProcessedEvent::ToolStart {
                    tool_name,
                    tool_use_id,
                    input,
                } => {
                    self.client
                        .stream_event(
                            session_id,
                            channels::events::TOOL_START,
                            json!({
                                "task_id": task_id,
                                "tool_name": tool_name,
                                "tool_use_id": tool_use_id,
                                "input": input,
                            }),
                        )
                        .await
                        .ok();
                }
                ProcessedEvent::ToolComplete {
                    tool_use_id,
                    result,
                } => {
                    self.client
                        .stream_event(
                            session_id,
                            channels::events::TOOL_COMPLETE,
                            json!({
                                "task_id": task_id,
                                "tool_use_id": tool_use_id,
                                "result": result,
                            }),
                        )
                        .await
                        .ok();
                }
                ProcessedEvent::SystemComplete {
                    system_type,
                    metadata,
                } => {
                    self.guarded_create_message(
                        Role::System,
                        vec![ContentBlock::SystemStatus {
                            system_type: Some(system_type),
                            status: None,
                            metadata,
                        }],
                        None,
                        None,
                    )
                    .await?;
                }
                ProcessedEvent::Complete {
                    role,
                    content,
                    parent_tool_use_id,
                    token_usage,
                    model_usage,
                    ..
                } => {
                    let metadata = complete_metadata(
                        turn.resolved_model.clone(),
                        token_usage,
                        &model_usage,
                    );
                    if role == Role::Assistant
                        && let Some(streaming) = turn.streaming_message.take()
                    {
                        // Streaming-complete merge: same message id, full
                        // content, derived fields recomputed server-side
                        self.client
                            .merge_message(streaming.message_id, content, metadata)
                            .await
                            .map(|_| ())
                            .or_else(swallow_not_found)?;
                        self.client
                            .stream_event(
                                session_id,
                                channels::events::STREAMING_END,
                                json!({ "task_id": task_id, "message_id": streaming.message_id }),
                            )
                            .await
                            .ok();
                    } else {
                        self.guarded_create_message(role, content, parent_tool_use_id, metadata)
                            .await?;
                    }
                }
                ProcessedEvent::Result {
                    raw_sdk_message, ..
                } => {
                    turn.raw_result = Some(raw_sdk_message);
                }
                ProcessedEvent::Stopped => {
                    turn.stopped = true;
                }
            }

            if self.stop.is_stopped() {
                turn.stopped = true;
            }
        }
        Ok(())
    }

    /// Session-guarded message write: a session deleted mid-execution
    /// downgrades the write to a logged no-op.
    async fn guarded_create_message(
        &self,
        role: Role,
        content: Vec<ContentBlock>,
        parent_tool_use_id: Option<String>,
        metadata: Option<MessageMetadata>,
    ) -> Result<Option<Message>> {
        let result = self
            .client
            .create_message(
                self.session.session_id,
                Some(self.args.task_id),
                role,
                content,
                parent_tool_use_id,
                metadata,
            )
            .await;
        match result {
            Ok(message) => Ok(Some(message)),
            Err(e) if e.is_not_found() => {
                warn!(session = %self.session.session_id, "session gone; message write skipped");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn finish_completed(&self, turn: &TurnState) -> Result<()> {
        let raw = turn.raw_result.clone().unwrap_or(serde_json::Value::Null);

        let prior_tasks = self
            .client
            .completed_tasks(self.session.session_id, TASK_SCAN_WINDOW)
            .await
            .unwrap_or_default();
        let ctx = NormalizeContext {
            prior_tasks: &prior_tasks,
        };
        let adapter = ToolAdapter::for_tool(self.args.tool);
        let normalized = adapter.normalizer.normalize(&raw, &ctx);

        let current_tokens = current_turn_fresh_tokens(self.args.tool, &raw, &ctx);
        let messages = self
            .client
            .messages(self.session.session_id)
            .await
            .unwrap_or_default();
        let window = compute_context_window(
            &messages,
            &prior_tasks,
            self.args.task_id,
            current_tokens,
        );

        let mut patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            raw_sdk_response: Some(raw),
            computed_context_window: Some(window),
            ..Default::default()
        };
        if let Some(normalized) = normalized {
            patch.normalized_sdk_response = Some(normalized);
        }
        self.client
            .patch_task(self.args.task_id, patch)
            .await
            .map(|_| ())
            .or_else(swallow_not_found)?;

        self.patch_session_finished(SessionStatus::Idle, turn.agent_session_id.clone())
            .await;
        info!(task = %self.args.task_id, context_window = window, "task completed");
        Ok(())
    }

    async fn finish_stopped(&self) {
        let _ = self
            .client
            .patch_task(self.args.task_id, TaskPatch {
                status: Some(TaskStatus::Stopped),
                ..Default::default()
            })
            .await;
        self.patch_session_finished(SessionStatus::Idle, None).await;
        info!(task = %self.args.task_id, "task stopped");
    }

    async fn finish_failed(&self, reason: &str) {
        let _ = self
            .client
            .patch_task(self.args.task_id, TaskPatch {
                status: Some(TaskStatus::Failed),
                failure_reason: Some(reason.to_string()),
                ..Default::default()
            })
            .await;
        self.patch_session_finished(SessionStatus::Failed, None).await;
        warn!(task = %self.args.task_id, reason, "task failed");
    }

    /// Final session patch, session-guarded: capturing `sdk_session_id`
    /// on a concurrently deleted session is benign.
    async fn patch_session_finished(
        &self,
        status: SessionStatus,
        sdk_session_id: Option<String>,
    ) {
        let patch = SessionPatch {
            status: Some(status),
            ready_for_prompt: Some(true),
            sdk_session_id: sdk_session_id.map(Some),
            ..Default::default()
        };
        match self.client.patch_session(self.session.session_id, patch).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!(session = %self.session.session_id, "session gone; final patch skipped");
            }
            Err(e) => {
                warn!(session = %self.session.session_id, error = %e, "final session patch failed");
            }
        }
    }
}

fn swallow_not_found(e: agor_sdk::Error) -> Result<()> {
    if e.is_not_found() {
        warn!(error = %e, "target gone; write skipped");
        Ok(())
    } else {
        Err(e.into())
    }
}

fn complete_metadata(
    model: Option<String>,
    token_usage: Option<TokenUsage>,
    model_usage: &Option<ModelUsage>,
) -> Option<MessageMetadata> {
    if model.is_none() && token_usage.is_none() && model_usage.is_none() {
        return None;
    }
    Some(MessageMetadata {
        model,
        tokens: token_usage.map(|usage| MessageTokens {
            input: usage.input_tokens,
            output: usage.output_tokens,
        }),
    })
}

#[derive(Default)]
struct TurnState {
    streaming_message: Option<Message>,
    thinking_open: bool,
    agent_session_id: Option<String>,
    resolved_model: Option<String>,
    raw_result: Option<serde_json::Value>,
    stopped: bool,
}
