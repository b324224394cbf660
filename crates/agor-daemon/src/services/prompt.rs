use super::{CreateMessage, PromptRequest, Services};
use crate::error::{Error, Result};
use agor_types::{
    ContentBlock, Role, SessionPatch, SessionStatus, Task, channels, task_channel,
};
use tracing::{info, warn};

impl Services {
    /// Prompt submission: persist the user message, enqueue a task, flip
    /// the session to running and hand the task to an executor process.
    ///
    /// The one-active-task invariant is enforced here: a session with a
    /// running or awaiting task rejects further prompts.
    pub async fn submit_prompt(&self, request: PromptRequest) -> Result<Task> {
        let session = self.get_session(request.session_id).await?;

        {
            let store = self.store.lock().await;
            if store.find_open_task(session.session_id)?.is_some() {
                return Err(Error::Conflict(format!(
                    "session {} already has an active task",
                    session.session_id
                )));
            }
        }

        let created_by = request
            .created_by
            .clone()
            .unwrap_or_else(|| session.created_by.clone());

        let mut task = Task::new(session.session_id, created_by);
        task.model = session.model_config.model.clone().or_else(|| {
            Some(self.config.default_model_for(session.agentic_tool))
        });
        {
            let store = self.store.lock().await;
            store.insert_task(&task)?;
        }
        self.bus.emit(
            &task_channel(task.task_id),
            channels::events::TASK_CREATE,
            serde_json::to_value(&task)?,
        );

        self.create_message(CreateMessage {
            session_id: session.session_id,
            task_id: Some(task.task_id),
            role: Role::User,
            content: vec![ContentBlock::text(&request.prompt)],
            parent_tool_use_id: None,
            metadata: None,
        })
        .await?;

        self.patch_session(session.session_id, SessionPatch {
            status: Some(SessionStatus::Running),
            ready_for_prompt: Some(false),
            ..Default::default()
        })
        .await?;

        match &self.spawner {
            Some(spawner) => {
                spawner
                    .spawn(&session, &task, &request.prompt, request.permission_mode)
                    .await?;
                info!(session = %session.session_id, task = %task.task_id, "executor spawned");
            }
            None => {
                warn!(
                    session = %session.session_id,
                    "no executor spawner configured; task left queued"
                );
            }
        }

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::services::CreateSession;
    use agor_store::Database;
    use agor_types::{AgenticTool, TaskStatus};
    use std::sync::Arc;

    fn services() -> Services {
        let store = Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()));
        Services::new(
            store,
            crate::bus::EventBus::new(),
            Arc::new(DaemonConfig::default()),
        )
    }

    async fn session(services: &Services) -> agor_types::Session {
        services
            .create_session(CreateSession {
                agentic_tool: AgenticTool::ClaudeCode,
                worktree_id: None,
                created_by: "tester".into(),
                model_config: None,
                permission_config: None,
                genealogy: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_prompt_creates_user_message_at_index_zero() {
        let services = services();
        let session = session(&services).await;

        let task = services
            .submit_prompt(PromptRequest {
                session_id: session.session_id,
                prompt: "hello".into(),
                permission_mode: None,
                created_by: None,
            })
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.model.as_deref(), Some("claude-sonnet-4-5"));

        let messages = services.list_messages(session.session_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].index, 0);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content_preview, "hello");
        assert_eq!(messages[0].task_id, Some(task.task_id));

        let patched = services.get_session(session.session_id).await.unwrap();
        assert_eq!(patched.status, SessionStatus::Running);
        assert!(!patched.ready_for_prompt);
    }

    #[tokio::test]
    async fn test_second_prompt_while_active_rejected() {
        let services = services();
        let session = session(&services).await;

        let task = services
            .submit_prompt(PromptRequest {
                session_id: session.session_id,
                prompt: "one".into(),
                permission_mode: None,
                created_by: None,
            })
            .await
            .unwrap();

        // Executor would set running; emulate it
        services
            .patch_task(task.task_id, agor_types::TaskPatch {
                status: Some(TaskStatus::Running),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = services
            .submit_prompt(PromptRequest {
                session_id: session.session_id,
                prompt: "two".into(),
                permission_mode: None,
                created_by: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
