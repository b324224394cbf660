use super::{CreateSession, Services};
use crate::error::{Error, Result};
use agor_store::SessionFilter;
use agor_types::{
    Session, SessionId, SessionPatch, SessionStatus, channels, session_channel,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

impl Services {
    pub async fn create_session(&self, input: CreateSession) -> Result<Session> {
        let store = self.store.lock().await;

        // A session may exist before its workspace, but a dangling
        // worktree reference is rejected outright.
        if let Some(worktree_id) = input.worktree_id
            && store.find_worktree(worktree_id)?.is_none()
        {
            return Err(Error::Conflict(format!(
                "worktree {worktree_id} does not exist"
            )));
        }

        let mut session = Session::new(input.agentic_tool, input.created_by);
        session.worktree_id = input.worktree_id;
        if let Some(model_config) = input.model_config {
            session.model_config = model_config;
        }
        if let Some(permission_config) = input.permission_config {
            session.permission_config = permission_config;
        }
        if let Some(genealogy) = input.genealogy {
            session.genealogy = genealogy;
        }
        session.mcp_token = Some(Uuid::new_v4().simple().to_string());

        store.insert_session(&session)?;
        drop(store);

        info!(session = %session.session_id, tool = %session.agentic_tool.as_str(), "session created");
        self.bus.emit(
            &session_channel(session.session_id),
            channels::events::SESSION_CREATE,
            serde_json::to_value(&session)?,
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let store = self.store.lock().await;
        Ok(store.get_session(session_id)?)
    }

    pub async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        let store = self.store.lock().await;
        Ok(store.find_session(session_id)?)
    }

    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let store = self.store.lock().await;
        Ok(store.list_sessions(filter)?)
    }

    pub async fn patch_session(
        &self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<Session> {
        let mut session = {
            let store = self.store.lock().await;
            store.get_session(session_id)?
        };

        if let Some(status) = patch.status {
            session.status = status;
        }
        if let Some(worktree_id) = patch.worktree_id {
            session.worktree_id = worktree_id;
        }
        if let Some(model_config) = patch.model_config {
            session.model_config = model_config;
        }
        if let Some(permission_config) = patch.permission_config {
            session.permission_config = permission_config;
        }
        if let Some(sdk_session_id) = patch.sdk_session_id {
            session.sdk_session_id = sdk_session_id;
        }
        if let Some(ready) = patch.ready_for_prompt {
            session.ready_for_prompt = ready;
        }
        if let Some(archived) = patch.archived {
            session.archived = archived;
        }
        session.last_updated = Utc::now();

        {
            let store = self.store.lock().await;
            store.update_session(&session)?;
        }

        self.bus.emit(
            &session_channel(session_id),
            channels::events::SESSION_PATCH,
            serde_json::to_value(&session)?,
        );
        Ok(session)
    }

    /// Remove a session; tasks and messages cascade. The per-session
    /// Gemini context file goes with it.
    pub async fn remove_session(&self, session_id: SessionId) -> Result<()> {
        {
            let store = self.store.lock().await;
            store.delete_session(session_id)?;
        }
        agor_providers::gemini::remove_context_file(session_id);

        self.bus.emit(
            &session_channel(session_id),
            channels::events::SESSION_REMOVE,
            serde_json::json!({ "session_id": session_id }),
        );
        Ok(())
    }

    /// Remember a tool at session scope. Insertion is idempotent and the
    /// patched config is re-read from the store before returning, so the
    /// caller observes exactly what later gates will see.
    pub async fn remember_allowed_tool(
        &self,
        session_id: SessionId,
        tool_name: &str,
    ) -> Result<Session> {
        let mut config = {
            let store = self.store.lock().await;
            store.get_session(session_id)?.permission_config
        };
        config.remember(tool_name);

        self.patch_session(session_id, SessionPatch {
            permission_config: Some(config),
            ..Default::default()
        })
        .await?;

        let reread = self.get_session(session_id).await?;
        if !reread.permission_config.is_allowed(tool_name) {
            return Err(Error::Conflict(format!(
                "allowed tool {tool_name} did not persist"
            )));
        }
        Ok(reread)
    }

    /// Stop signal for the session's active task. The event is what stops
    /// the executor; the status flip is bookkeeping for observers.
    pub async fn stop_task(
        &self,
        session_id: SessionId,
        task_id: agor_types::TaskId,
        sequence: u64,
    ) -> Result<()> {
        self.patch_session(session_id, SessionPatch {
            status: Some(SessionStatus::Stopping),
            ..Default::default()
        })
        .await?;

        self.bus.emit(
            &session_channel(session_id),
            channels::events::TASK_STOP,
            serde_json::json!({ "task_id": task_id, "sequence": sequence }),
        );
        Ok(())
    }

    /// Executor acknowledgment that a stop was seen; echoed to observers
    pub async fn ack_stop(
        &self,
        session_id: SessionId,
        task_id: agor_types::TaskId,
        sequence: u64,
    ) -> Result<()> {
        self.bus.emit(
            &session_channel(session_id),
            channels::events::TASK_STOP_ACK,
            serde_json::json!({ "task_id": task_id, "sequence": sequence }),
        );
        Ok(())
    }
}
