use super::Services;
use crate::error::{Error, Result};
use agor_types::{
    PermissionDecision, PermissionRequest, Task, TaskPatch, TaskStatus, channels,
    message_channel, session_channel,
};
use chrono::Utc;
use tracing::info;

impl Services {
    /// Executor-side gate announcing a pending request: the task flips to
    /// `awaiting_permission` (carrying the request) and the request fans
    /// out on the session channel. The task patch is emitted first so UIs
    /// observe the status change before the question.
    pub async fn announce_permission_request(
        &self,
        request: PermissionRequest,
    ) -> Result<Task> {
        let task = self
            .patch_task(request.task_id, TaskPatch {
                status: Some(TaskStatus::AwaitingPermission),
                permission_request: Some(Some(request.clone())),
                ..Default::default()
            })
            .await?;

        self.bus.emit(
            &session_channel(request.session_id),
            channels::events::PERMISSION_REQUEST,
            serde_json::to_value(&request)?,
        );
        Ok(task)
    }

    /// Human (or policy) reply to a pending request. The decision is
    /// stamped onto the task's stored request and fanned out on both the
    /// session and message channels; the waiting executor picks it up from
    /// the session channel.
    pub async fn resolve_permission(&self, decision: PermissionDecision) -> Result<Task> {
        let task = self.find_task_for_request(&decision).await?;

        let mut request = task
            .permission_request
            .clone()
            .ok_or_else(|| Error::NotFound(format!("request {}", decision.request_id)))?;
        request.decided_by = decision.decided_by.clone();
        request.decided_at = Some(Utc::now());

        let task = self
            .patch_task(task.task_id, TaskPatch {
                permission_request: Some(Some(request)),
                ..Default::default()
            })
            .await?;

        info!(
            request = %decision.request_id,
            allow = decision.allow,
            "permission resolved"
        );
        let payload = serde_json::to_value(&decision)?;
        self.bus.emit(
            &session_channel(task.session_id),
            channels::events::PERMISSION_RESOLVED,
            payload.clone(),
        );
        self.bus.emit(
            &message_channel(task.session_id),
            channels::events::PERMISSION_RESOLVED,
            payload,
        );
        Ok(task)
    }

    async fn find_task_for_request(&self, decision: &PermissionDecision) -> Result<Task> {
        let store = self.store.lock().await;
        // The request id lives on exactly one awaiting task; scan the
        // sessions with an active gate rather than indexing requests.
        let sessions = store.list_sessions(&agor_store::SessionFilter::default())?;
        for session in sessions {
            if let Some(task) = store.find_active_task(session.session_id)?
                && task
                    .permission_request
                    .as_ref()
                    .map(|r| r.request_id == decision.request_id)
                    .unwrap_or(false)
            {
                return Ok(task);
            }
        }
        Err(Error::NotFound(format!(
            "permission request {}",
            decision.request_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::services::CreateSession;
    use agor_store::Database;
    use agor_types::{AgenticTool, Session};
    use std::sync::Arc;

    async fn setup() -> (Services, Session, Task) {
        let store = Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()));
        let services = Services::new(
            store,
            crate::bus::EventBus::new(),
            Arc::new(DaemonConfig::default()),
        );
        let session = services
            .create_session(CreateSession {
                agentic_tool: AgenticTool::ClaudeCode,
                worktree_id: None,
                created_by: "tester".into(),
                model_config: None,
                permission_config: None,
                genealogy: None,
            })
            .await
            .unwrap();
        let task = Task::new(session.session_id, "tester");
        services.store().lock().await.insert_task(&task).unwrap();
        (services, session, task)
    }

    #[tokio::test]
    async fn test_announce_then_resolve_ordering() {
        let (services, session, task) = setup().await;
        let mut rx = services.bus().subscribe(&session_channel(session.session_id));

        let request = PermissionRequest::new(
            task.task_id,
            session.session_id,
            "Bash",
            serde_json::json!({"command": "ls"}),
            "toolu_1",
        );
        services
            .announce_permission_request(request.clone())
            .await
            .unwrap();

        // task.patch(awaiting_permission) precedes permission_request
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, channels::events::TASK_PATCH);
        assert_eq!(first.payload["status"], "awaiting_permission");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, channels::events::PERMISSION_REQUEST);
        assert_eq!(second.payload["tool_name"], "Bash");

        let resolved = services
            .resolve_permission(PermissionDecision {
                request_id: request.request_id,
                allow: true,
                scope: Some(agor_types::PermissionScope::Session),
                decided_by: Some("alice".into()),
                reason: None,
            })
            .await
            .unwrap();
        let stored = resolved.permission_request.unwrap();
        assert_eq!(stored.decided_by.as_deref(), Some("alice"));
        assert!(stored.decided_at.is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_request_is_not_found() {
        let (services, _, _) = setup().await;
        let err = services
            .resolve_permission(PermissionDecision {
                request_id: agor_types::RequestId::new(),
                allow: false,
                scope: None,
                decided_by: None,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
