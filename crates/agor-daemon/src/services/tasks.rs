use super::Services;
use crate::error::{Error, Result};
use agor_types::{
    SessionId, Task, TaskId, TaskPatch, channels, session_channel, task_channel,
};
use chrono::Utc;

impl Services {
    pub async fn get_task(&self, task_id: TaskId) -> Result<Task> {
        let store = self.store.lock().await;
        Ok(store.get_task(task_id)?)
    }

    pub async fn list_tasks(&self, session_id: SessionId, limit: usize) -> Result<Vec<Task>> {
        let store = self.store.lock().await;
        Ok(store.list_tasks(session_id, limit)?)
    }

    pub async fn list_completed_tasks(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let store = self.store.lock().await;
        Ok(store.list_completed_tasks(session_id, limit)?)
    }

    /// Patch a task. Terminal statuses set `completed_at`; the normalized
    /// response is write-once. The post-state is emitted on the task's own
    /// channel and echoed to the session channel so session observers see
    /// task transitions in FIFO order with permission traffic.
    pub async fn patch_task(&self, task_id: TaskId, patch: TaskPatch) -> Result<Task> {
        let mut task = {
            let store = self.store.lock().await;
            store.get_task(task_id)?
        };

        if patch.normalized_sdk_response.is_some() && task.normalized_sdk_response.is_some() {
            return Err(Error::Conflict(format!(
                "task {task_id} already has a normalized response"
            )));
        }

        if let Some(status) = patch.status {
            task.status = status;
            if status.is_terminal() && task.completed_at.is_none() {
                task.completed_at = Some(Utc::now());
            }
        }
        if let Some(model) = patch.model {
            task.model = Some(model);
        }
        if let Some(permission_request) = patch.permission_request {
            task.permission_request = permission_request;
        }
        if let Some(raw) = patch.raw_sdk_response {
            task.raw_sdk_response = Some(raw);
        }
        if let Some(normalized) = patch.normalized_sdk_response {
            task.normalized_sdk_response = Some(normalized);
        }
        if let Some(window) = patch.computed_context_window {
            task.computed_context_window = Some(window);
        }
        if let Some(reason) = patch.failure_reason {
            task.failure_reason = Some(reason);
        }

        {
            let store = self.store.lock().await;
            store.update_task(&task)?;
        }

        let payload = serde_json::to_value(&task)?;
        self.bus.emit(
            &task_channel(task_id),
            channels::events::TASK_PATCH,
            payload.clone(),
        );
        self.bus.emit(
            &session_channel(task.session_id),
            channels::events::TASK_PATCH,
            payload,
        );

        self.maybe_emit_context_warning(&task);
        Ok(task)
    }

    /// Context-usage warning: fires when a completed task's computed window
    /// crosses 80% (and again at 95%) of the model's limit.
    fn maybe_emit_context_warning(&self, task: &Task) {
        let Some(window) = task.computed_context_window else {
            return;
        };
        let Some(normalized) = &task.normalized_sdk_response else {
            return;
        };
        let limit = normalized.context_window_limit;
        if limit == 0 {
            return;
        }
        let pct = (window as f64 / limit as f64) * 100.0;
        let level = if pct >= 95.0 {
            "critical"
        } else if pct >= 80.0 {
            "warning"
        } else {
            return;
        };
        self.bus.emit(
            &session_channel(task.session_id),
            channels::events::SESSION_CONTEXT_WARNING,
            serde_json::json!({
                "task_id": task.task_id,
                "level": level,
                "used_tokens": window,
                "context_window_limit": limit,
            }),
        );
    }
}
