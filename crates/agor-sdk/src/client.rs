use crate::error::{Error, Result};
use agor_types::{
    ContentBlock, Frame, Message, MessageId, MessageMetadata, PermissionDecision,
    PermissionRequest, Role, Session, SessionId, SessionPatch, Task, TaskId, TaskPatch,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

/// Events delivered for one subscribed channel, in channel FIFO order
pub struct Subscription {
    pub channel: String,
    receiver: mpsc::UnboundedReceiver<agor_types::Frame>,
}

impl Subscription {
    /// Next event frame; None when the connection is gone
    pub async fn recv(&mut self) -> Option<(String, Value, u64)> {
        match self.receiver.recv().await {
            Some(Frame::Event {
                event, payload, seq, ..
            }) => Some((event, payload, seq)),
            _ => None,
        }
    }
}

struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<Frame>>>,
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<Frame>>>,
}

/// Connection to the daemon. Cloneable; all clones share one socket.
#[derive(Clone)]
pub struct Client {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    shared: Arc<Shared>,
    next_id: Arc<AtomicU64>,
}

impl Client {
    /// Dial and authenticate in one step
    pub async fn connect(addr: &str, token: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        });

        let reader_shared = shared.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let frame: Frame = match serde_json::from_str(&line) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "unparseable frame from daemon");
                        continue;
                    }
                };
                match &frame {
                    Frame::Response { id, .. } | Frame::Error { id, .. } => {
                        let sender = reader_shared.pending.lock().await.remove(id);
                        if let Some(sender) = sender {
                            let _ = sender.send(frame);
                        }
                    }
                    Frame::Event { channel, .. } => {
                        let subscribers = reader_shared.subscribers.lock().await;
                        if let Some(sender) = subscribers.get(channel) {
                            let _ = sender.send(frame.clone());
                        }
                    }
                    Frame::Request { .. } => {
                        debug!("request frame from daemon ignored");
                    }
                }
            }
            // Connection gone: fail every pending request
            let mut pending = reader_shared.pending.lock().await;
            pending.clear();
        });

        let client = Self {
            writer: Arc::new(Mutex::new(write_half)),
            shared,
            next_id: Arc::new(AtomicU64::new(1)),
        };

        client.request("auth", json!({ "token": token })).await?;
        Ok(client)
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id, tx);

        let frame = Frame::Request {
            id,
            method: method.to_string(),
            params,
        };
        let mut line = serde_json::to_string(&frame)?;
        line.push('\n');
        {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
        }

        match rx.await {
            Ok(Frame::Response { result, .. }) => Ok(result),
            Ok(Frame::Error { error, .. }) => Err(Error::Remote {
                kind: error.kind,
                message: error.message,
            }),
            _ => Err(Error::Disconnected),
        }
    }

    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .await
            .insert(channel.to_string(), tx);
        self.request("subscribe", json!({ "channel": channel }))
            .await?;
        Ok(Subscription {
            channel: channel.to_string(),
            receiver: rx,
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
        Ok(serde_json::from_value(value)?)
    }

    // --- typed surface ---

    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        Self::decode(
            self.request("sessions.get", json!({ "session_id": session_id }))
                .await?,
        )
    }

    pub async fn patch_session(
        &self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<Session> {
        Self::decode(
            self.request(
                "sessions.patch",
                json!({ "session_id": session_id, "patch": patch }),
            )
            .await?,
        )
    }

    pub async fn remember_tool(&self, session_id: SessionId, tool_name: &str) -> Result<Session> {
        Self::decode(
            self.request(
                "sessions.remember_tool",
                json!({ "session_id": session_id, "tool_name": tool_name }),
            )
            .await?,
        )
    }

    pub async fn mcp_servers(&self, session_id: SessionId) -> Result<agor_types::McpMergeResult> {
        Self::decode(
            self.request("sessions.mcp_servers", json!({ "session_id": session_id }))
                .await?,
        )
    }

    pub async fn get_worktree(
        &self,
        worktree_id: agor_types::WorktreeId,
    ) -> Result<agor_types::Worktree> {
        Self::decode(
            self.request("worktrees.get", json!({ "worktree_id": worktree_id }))
                .await?,
        )
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Task> {
        Self::decode(self.request("tasks.get", json!({ "task_id": task_id })).await?)
    }

    pub async fn patch_task(&self, task_id: TaskId, patch: TaskPatch) -> Result<Task> {
        Self::decode(
            self.request("tasks.patch", json!({ "task_id": task_id, "patch": patch }))
                .await?,
        )
    }

    pub async fn completed_tasks(&self, session_id: SessionId, limit: usize) -> Result<Vec<Task>> {
        Self::decode(
            self.request(
                "tasks.find",
                json!({ "session_id": session_id, "completed_only": true, "limit": limit }),
            )
            .await?,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_message(
        &self,
        session_id: SessionId,
        task_id: Option<TaskId>,
        role: Role,
        content: Vec<ContentBlock>,
        parent_tool_use_id: Option<String>,
        metadata: Option<MessageMetadata>,
    ) -> Result<Message> {
        Self::decode(
            self.request(
                "messages.create",
                json!({
                    "session_id": session_id,
                    "task_id": task_id,
                    "role": role,
                    "content": content,
                    "parent_tool_use_id": parent_tool_use_id,
                    "metadata": metadata,
                }),
            )
            .await?,
        )
    }

    pub async fn merge_message(
        &self,
        message_id: MessageId,
        content: Vec<ContentBlock>,
        metadata: Option<MessageMetadata>,
    ) -> Result<Message> {
        Self::decode(
            self.request(
                "messages.merge",
                json!({ "message_id": message_id, "content": content, "metadata": metadata }),
            )
            .await?,
        )
    }

    pub async fn messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        Self::decode(
            self.request("messages.find_by_session", json!({ "session_id": session_id }))
                .await?,
        )
    }

    /// Fire-and-forget streaming relay (chunks, tool progress)
    pub async fn stream_event(
        &self,
        session_id: SessionId,
        event: &str,
        payload: Value,
    ) -> Result<()> {
        self.request(
            "messages.stream_event",
            json!({ "session_id": session_id, "event": event, "payload": payload }),
        )
        .await?;
        Ok(())
    }

    pub async fn announce_permission_request(&self, request: &PermissionRequest) -> Result<Task> {
        Self::decode(
            self.request("permissions.request", serde_json::to_value(request)?)
                .await?,
        )
    }

    pub async fn resolve_permission(&self, decision: &PermissionDecision) -> Result<Task> {
        Self::decode(
            self.request("permissions.resolve", serde_json::to_value(decision)?)
                .await?,
        )
    }

    pub async fn stop_task(
        &self,
        session_id: SessionId,
        task_id: TaskId,
        sequence: u64,
    ) -> Result<()> {
        self.request(
            "sessions.stop",
            json!({ "session_id": session_id, "task_id": task_id, "sequence": sequence }),
        )
        .await?;
        Ok(())
    }

    pub async fn ack_stop(
        &self,
        session_id: SessionId,
        task_id: TaskId,
        sequence: u64,
    ) -> Result<()> {
        self.request(
            "sessions.stop_ack",
            json!({ "session_id": session_id, "task_id": task_id, "sequence": sequence }),
        )
        .await?;
        Ok(())
    }

    pub async fn prompt(
        &self,
        session_id: SessionId,
        prompt: &str,
        permission_mode: Option<agor_types::PermissionMode>,
    ) -> Result<Task> {
        Self::decode(
            self.request(
                "sessions.prompt",
                json!({
                    "session_id": session_id,
                    "prompt": prompt,
                    "permission_mode": permission_mode,
                }),
            )
            .await?,
        )
    }
}
