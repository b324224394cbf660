use crate::settings::remember_project_tool;
use agor_providers::{CancelledError, PermissionGate, StopHandle};
use agor_sdk::Client;
use agor_types::{
    PermissionDecision, PermissionMode, PermissionRequest, PermissionScope, PermissionVerdict,
    RequestId, SessionId, TaskId, TaskPatch, TaskStatus,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

/// The permission arbiter, running inline inside the streaming loop.
///
/// Decision sources, in race order: the daemon's `permission_resolved`
/// event, the stop handle (→ `CancelledError`), and an optional server
/// timeout (off by default). The gate lock keeps at most one request
/// outstanding per session; concurrent tool calls serialize behind it.
pub struct ExecutorGate {
    client: Client,
    session_id: SessionId,
    task_id: TaskId,
    mode: PermissionMode,
    allowed: Mutex<BTreeSet<String>>,
    denied: BTreeSet<String>,
    worktree_path: Option<PathBuf>,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<PermissionDecision>>>>,
    gate_lock: Mutex<()>,
    stop: StopHandle,
    decision_timeout: Option<Duration>,
}

impl ExecutorGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        session_id: SessionId,
        task_id: TaskId,
        mode: PermissionMode,
        session_allowed: BTreeSet<String>,
        project_allowed: BTreeSet<String>,
        project_denied: BTreeSet<String>,
        worktree_path: Option<PathBuf>,
        stop: StopHandle,
    ) -> Self {
        let mut allowed = session_allowed;
        allowed.extend(project_allowed);
        Self {
            client,
            session_id,
            task_id,
            mode,
            allowed: Mutex::new(allowed),
            denied: project_denied,
            worktree_path,
            pending: Arc::new(Mutex::new(HashMap::new())),
            gate_lock: Mutex::new(()),
            stop,
            decision_timeout: None,
        }
    }

    /// Server-side timeout policy; not fired by default
    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = Some(timeout);
        self
    }

    /// Route an incoming `permission_resolved` payload to the waiting gate
    pub async fn resolve(&self, decision: PermissionDecision) {
        let sender = self.pending.lock().await.remove(&decision.request_id);
        match sender {
            Some(sender) => {
                let _ = sender.send(decision);
            }
            None => warn!(request = %decision.request_id, "decision for unknown request dropped"),
        }
    }

    async fn await_decision(
        &self,
        rx: oneshot::Receiver<PermissionDecision>,
    ) -> Result<PermissionDecision> {
        let decision = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return Err(CancelledError.into()),
            decision = rx => decision,
        };
        decision.map_err(|_| CancelledError.into())
    }

    /// Apply a remember request. Any persistence failure downgrades the
    /// allow to a deny: the task must never proceed on an unrecorded
    /// approval.
    async fn persist_remember(&self, tool_name: &str, scope: PermissionScope) -> Result<()> {
        match scope {
            PermissionScope::Once => Ok(()),
            PermissionScope::Session => {
                let session = self.client.remember_tool(self.session_id, tool_name).await?;
                if !session.permission_config.is_allowed(tool_name) {
                    anyhow::bail!("session allow-list write not visible on re-read");
                }
                self.allowed.lock().await.insert(tool_name.to_string());
                Ok(())
            }
            PermissionScope::Project => {
                let worktree = self
                    .worktree_path
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("no worktree for project-scope remember"))?;
                remember_project_tool(worktree, tool_name)?;
                self.allowed.lock().await.insert(tool_name.to_string());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PermissionGate for ExecutorGate {
    async fn check(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        tool_use_id: &str,
    ) -> Result<PermissionVerdict> {
        // Serialize: at most one outstanding request per session
        let _guard = self.gate_lock.lock().await;

        if self.mode == PermissionMode::Bypass {
            return Ok(PermissionVerdict::Allow);
        }
        if self.denied.contains(tool_name) {
            return Ok(PermissionVerdict::Deny {
                reason: format!("{tool_name} is blocked by project policy"),
            });
        }
        if self.allowed.lock().await.contains(tool_name) {
            return Ok(PermissionVerdict::Allow);
        }

        // Ask: announce (task → awaiting_permission, request on the bus),
        // then block on the reply
        let request = PermissionRequest::new(
            self.task_id,
            self.session_id,
            tool_name,
            tool_input.clone(),
            tool_use_id,
        );
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request.request_id, tx);
        self.client.announce_permission_request(&request).await?;
        info!(request = %request.request_id, tool = tool_name, "awaiting permission");

        let decision = match self.decision_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.await_decision(rx)).await {
                Ok(decision) => decision?,
                Err(_) => PermissionDecision {
                    request_id: request.request_id,
                    allow: false,
                    scope: None,
                    decided_by: None,
                    reason: Some("permission request timed out".into()),
                },
            },
            None => self.await_decision(rx).await?,
        };

        if !decision.allow {
            return Ok(PermissionVerdict::Deny {
                reason: decision
                    .reason
                    .unwrap_or_else(|| format!("{tool_name} denied by user")),
            });
        }

        if let Some(scope) = decision.scope
            && let Err(e) = self.persist_remember(tool_name, scope).await
        {
            // Approval that cannot be recorded does not count
            return Ok(PermissionVerdict::Deny {
                reason: format!("failed to record approval: {e}"),
            });
        }

        self.client
            .patch_task(self.task_id, TaskPatch {
                status: Some(TaskStatus::Running),
                permission_request: Some(None),
                ..Default::default()
            })
            .await?;

        Ok(PermissionVerdict::Allow)
    }
}
