use crate::error::{Error, Result};
use crate::services::{
    CreateMessage, CreateSession, CreateWorktree, PromptRequest, Services,
};
use crate::spawn::SessionTokens;
use agor_store::SessionFilter;
use agor_types::{
    ErrorBody, Frame, MessageId, PermissionDecision, PermissionRequest, SessionId,
    SessionPatch, TaskId, TaskPatch, WorktreeId, WorktreePatch,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// JSON-line RPC server over TCP. One task per connection; per-connection
/// subscriptions forward bus events as `Event` frames. The first request
/// on a connection must be `auth`.
pub struct Server {
    services: Services,
    tokens: SessionTokens,
}

impl Server {
    pub fn new(services: Services, tokens: SessionTokens) -> Self {
        Self { services, tokens }
    }

    pub async fn run(self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "daemon listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(peer = %peer, "client connected");
            let services = self.services.clone();
            let tokens = self.tokens.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, services, tokens).await {
                    debug!(peer = %peer, error = %e, "connection closed");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    services: Services,
    tokens: SessionTokens,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // All frames leave through one queue so response/event interleaving
    // stays line-atomic
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(256);
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let Ok(mut line) = serde_json::to_string(&frame) else {
                continue;
            };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut authenticated = false;
    let mut subscriptions: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "unparseable frame dropped");
                continue;
            }
        };
        let Frame::Request { id, method, params } = frame else {
            continue;
        };

        if method == "auth" {
            let token = params
                .get("token")
                .and_then(Value::as_str)
                .unwrap_or_default();
            authenticated =
                token == services.config().auth_token || tokens.verify(token).is_some();
            let reply = if authenticated {
                Frame::Response {
                    id,
                    result: json!({ "ok": true }),
                }
            } else {
                Frame::Error {
                    id,
                    error: ErrorBody {
                        kind: agor_types::ErrorKind::Unauthenticated,
                        message: "invalid token".into(),
                    },
                }
            };
            let _ = out_tx.send(reply).await;
            continue;
        }

        if !authenticated {
            let _ = out_tx
                .send(Frame::Error {
                    id,
                    error: ErrorBody {
                        kind: agor_types::ErrorKind::Unauthenticated,
                        message: "authenticate first".into(),
                    },
                })
                .await;
            continue;
        }

        match method.as_str() {
            "subscribe" => {
                let channel = params
                    .get("channel")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if !subscriptions.contains_key(&channel) {
                    let mut rx = services.bus().subscribe(&channel);
                    let forward = out_tx.clone();
                    let handle = tokio::spawn(async move {
                        loop {
                            match rx.recv().await {
                                Ok(event) => {
                                    let frame = Frame::Event {
                                        channel: event.channel,
                                        event: event.event,
                                        payload: event.payload,
                                        seq: event.seq,
                                    };
                                    if forward.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                    warn!(lagged = n, "subscriber lagged; events dropped");
                                }
                                Err(_) => break,
                            }
                        }
                    });
                    subscriptions.insert(channel, handle);
                }
                let _ = out_tx
                    .send(Frame::Response {
                        id,
                        result: json!({ "ok": true }),
                    })
                    .await;
            }
            "unsubscribe" => {
                let channel = params
                    .get("channel")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(handle) = subscriptions.remove(channel) {
                    handle.abort();
                }
                let _ = out_tx
                    .send(Frame::Response {
                        id,
                        result: json!({ "ok": true }),
                    })
                    .await;
            }
            _ => {
                let reply = match dispatch(&services, &method, params).await {
                    Ok(result) => Frame::Response { id, result },
                    Err(e) => Frame::Error {
                        id,
                        error: ErrorBody {
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    },
                };
                let _ = out_tx.send(reply).await;
            }
        }
    }

    for (_, handle) in subscriptions {
        handle.abort();
    }
    writer.abort();
    Ok(())
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::Validation(e.to_string()))
}

#[derive(Deserialize)]
struct SessionRef {
    session_id: SessionId,
}

#[derive(Deserialize)]
struct TaskRef {
    task_id: TaskId,
}

#[derive(Deserialize)]
struct WorktreeRef {
    worktree_id: WorktreeId,
}

async fn dispatch(services: &Services, method: &str, params: Value) -> Result<Value> {
    match method {
        "sessions.create" => {
            let input: CreateSession = parse(params)?;
            Ok(serde_json::to_value(services.create_session(input).await?)?)
        }
        "sessions.get" => {
            let SessionRef { session_id } = parse(params)?;
            Ok(serde_json::to_value(services.get_session(session_id).await?)?)
        }
        "sessions.find" => {
            #[derive(Deserialize)]
            struct Params {
                #[serde(default)]
                tool: Option<agor_types::AgenticTool>,
                #[serde(default)]
                status: Option<agor_types::SessionStatus>,
                #[serde(default)]
                worktree_id: Option<WorktreeId>,
                #[serde(default)]
                limit: Option<usize>,
                #[serde(default)]
                include_archived: bool,
            }
            let p: Params = parse(params)?;
            let filter = SessionFilter {
                tool: p.tool,
                status: p.status,
                worktree_id: p.worktree_id,
                since: None,
                until: None,
                limit: p.limit,
                include_archived: p.include_archived,
            };
            Ok(serde_json::to_value(services.list_sessions(&filter).await?)?)
        }
        "sessions.patch" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                patch: SessionPatch,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services.patch_session(p.session_id, p.patch).await?,
            )?)
        }
        "sessions.remove" => {
            let SessionRef { session_id } = parse(params)?;
            services.remove_session(session_id).await?;
            Ok(json!({ "ok": true }))
        }
        "sessions.prompt" => {
            let input: PromptRequest = parse(params)?;
            Ok(serde_json::to_value(services.submit_prompt(input).await?)?)
        }
        "sessions.stop" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                task_id: TaskId,
                sequence: u64,
            }
            let p: Params = parse(params)?;
            services.stop_task(p.session_id, p.task_id, p.sequence).await?;
            Ok(json!({ "ok": true }))
        }
        "sessions.stop_ack" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                task_id: TaskId,
                sequence: u64,
            }
            let p: Params = parse(params)?;
            services.ack_stop(p.session_id, p.task_id, p.sequence).await?;
            Ok(json!({ "ok": true }))
        }
        "sessions.remember_tool" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                tool_name: String,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services
                    .remember_allowed_tool(p.session_id, &p.tool_name)
                    .await?,
            )?)
        }
        "sessions.mcp_servers" => {
            let SessionRef { session_id } = parse(params)?;
            Ok(serde_json::to_value(
                services.mcp_servers_for_session(session_id).await?,
            )?)
        }
        "sessions.mcp_servers.create" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                server_id: String,
            }
            let p: Params = parse(params)?;
            {
                let store = services.store().lock().await;
                store.get_session(p.session_id)?;
                store.link_session_mcp_server(p.session_id, &p.server_id, chrono::Utc::now())?;
            }
            Ok(json!({ "ok": true }))
        }
        "sessions.mcp_servers.remove" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                server_id: String,
            }
            let p: Params = parse(params)?;
            {
                let store = services.store().lock().await;
                store.unlink_session_mcp_server(p.session_id, &p.server_id)?;
            }
            Ok(json!({ "ok": true }))
        }
        "tasks.get" => {
            let TaskRef { task_id } = parse(params)?;
            Ok(serde_json::to_value(services.get_task(task_id).await?)?)
        }
        "tasks.patch" => {
            #[derive(Deserialize)]
            struct Params {
                task_id: TaskId,
                patch: TaskPatch,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(services.patch_task(p.task_id, p.patch).await?)?)
        }
        "tasks.find" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                #[serde(default)]
                completed_only: bool,
                #[serde(default = "default_task_limit")]
                limit: usize,
            }
            let p: Params = parse(params)?;
            let tasks = if p.completed_only {
                services.list_completed_tasks(p.session_id, p.limit).await?
            } else {
                services.list_tasks(p.session_id, p.limit).await?
            };
            Ok(serde_json::to_value(tasks)?)
        }
        "messages.create" => {
            let input: CreateMessage = parse(params)?;
            Ok(serde_json::to_value(services.create_message(input).await?)?)
        }
        "messages.merge" => {
            #[derive(Deserialize)]
            struct Params {
                message_id: MessageId,
                content: Vec<agor_types::ContentBlock>,
                #[serde(default)]
                metadata: Option<agor_types::MessageMetadata>,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services
                    .merge_message_content(p.message_id, p.content, p.metadata)
                    .await?,
            )?)
        }
        "messages.find_by_session" => {
            let SessionRef { session_id } = parse(params)?;
            Ok(serde_json::to_value(services.list_messages(session_id).await?)?)
        }
        "messages.stream_event" => {
            #[derive(Deserialize)]
            struct Params {
                session_id: SessionId,
                event: String,
                #[serde(default)]
                payload: Value,
            }
            let p: Params = parse(params)?;
            services.emit_streaming_event(p.session_id, &p.event, p.payload);
            Ok(json!({ "ok": true }))
        }
        "worktrees.create" => {
            let input: CreateWorktree = parse(params)?;
            Ok(serde_json::to_value(services.create_worktree(input).await?)?)
        }
        "worktrees.get" => {
            let WorktreeRef { worktree_id } = parse(params)?;
            Ok(serde_json::to_value(services.get_worktree(worktree_id).await?)?)
        }
        "worktrees.patch" => {
            #[derive(Deserialize)]
            struct Params {
                worktree_id: WorktreeId,
                patch: WorktreePatch,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services.patch_worktree(p.worktree_id, p.patch).await?,
            )?)
        }
        "worktrees.archive" => {
            let WorktreeRef { worktree_id } = parse(params)?;
            Ok(serde_json::to_value(services.archive_worktree(worktree_id).await?)?)
        }
        "worktrees.unarchive" => {
            let WorktreeRef { worktree_id } = parse(params)?;
            Ok(serde_json::to_value(
                services.unarchive_worktree(worktree_id).await?,
            )?)
        }
        "worktrees.remove" => {
            let WorktreeRef { worktree_id } = parse(params)?;
            services.remove_worktree(worktree_id).await?;
            Ok(json!({ "ok": true }))
        }
        "worktrees.owners.find" => {
            let WorktreeRef { worktree_id } = parse(params)?;
            Ok(serde_json::to_value(
                services.list_worktree_owners(worktree_id).await?,
            )?)
        }
        "worktrees.owners.create" => {
            #[derive(Deserialize)]
            struct Params {
                worktree_id: WorktreeId,
                user_id: String,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services.add_worktree_owner(p.worktree_id, &p.user_id).await?,
            )?)
        }
        "worktrees.owners.remove" => {
            #[derive(Deserialize)]
            struct Params {
                worktree_id: WorktreeId,
                user_id: String,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services
                    .remove_worktree_owner(p.worktree_id, &p.user_id)
                    .await?,
            )?)
        }
        "board_comments.reply" => {
            #[derive(Deserialize)]
            struct Params {
                board_id: agor_types::BoardId,
                #[serde(default)]
                parent_comment_id: Option<String>,
                author: String,
                body: String,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services
                    .reply_board_comment(p.board_id, p.parent_comment_id, p.author, p.body)
                    .await?,
            )?)
        }
        "board_comments.toggle_reaction" => {
            #[derive(Deserialize)]
            struct Params {
                comment_id: String,
                emoji: String,
                user: String,
            }
            let p: Params = parse(params)?;
            Ok(serde_json::to_value(
                services
                    .toggle_comment_reaction(&p.comment_id, &p.emoji, &p.user)
                    .await?,
            )?)
        }
        "permissions.request" => {
            let request: PermissionRequest = parse(params)?;
            Ok(serde_json::to_value(
                services.announce_permission_request(request).await?,
            )?)
        }
        "permissions.resolve" => {
            let decision: PermissionDecision = parse(params)?;
            Ok(serde_json::to_value(services.resolve_permission(decision).await?)?)
        }
        other => Err(Error::Validation(format!("unknown method: {other}"))),
    }
}

fn default_task_limit() -> usize {
    100
}
