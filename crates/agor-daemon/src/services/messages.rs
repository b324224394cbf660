use super::{CreateMessage, Services};
use crate::error::Result;
use agor_types::{Message, MessageId, SessionId, channels, message_channel};

impl Services {
    /// Append a message. The index is allocated from a point-in-time read
    /// under the store lock; the single-writer-per-session rule makes the
    /// allocation race-free and gap-free.
    pub async fn create_message(&self, input: CreateMessage) -> Result<Message> {
        let message = {
            let store = self.store.lock().await;
            // Existence check keeps a racing session delete from leaving
            // orphan messages behind the cascade.
            store.get_session(input.session_id)?;

            let index = store.next_message_index(input.session_id)?;
            let mut message = Message::new(input.session_id, index, input.role, input.content);
            message.task_id = input.task_id;
            message.parent_tool_use_id = input.parent_tool_use_id;
            if let Some(metadata) = input.metadata {
                message.metadata = metadata;
            }
            store.insert_message(&message)?;
            message
        };

        self.bus.emit(
            &message_channel(input.session_id),
            channels::events::MESSAGE_CREATE,
            serde_json::to_value(&message)?,
        );
        Ok(message)
    }

    /// Streaming-complete merge: replace the content of an existing
    /// message id and recompute its derived fields.
    pub async fn merge_message_content(
        &self,
        message_id: MessageId,
        content: Vec<agor_types::ContentBlock>,
        metadata: Option<agor_types::MessageMetadata>,
    ) -> Result<Message> {
        let message = {
            let store = self.store.lock().await;
            let mut message = store
                .find_message(message_id)?
                .ok_or_else(|| crate::error::Error::NotFound(format!("message {message_id}")))?;
            message.content = content;
            if let Some(metadata) = metadata {
                message.metadata = metadata;
            }
            message.refresh_derived();
            store.update_message(&message)?;
            message
        };

        self.bus.emit(
            &message_channel(message.session_id),
            channels::events::MESSAGE_PATCH,
            serde_json::to_value(&message)?,
        );
        Ok(message)
    }

    pub async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        let store = self.store.lock().await;
        Ok(store.list_messages(session_id)?)
    }

    /// Relay a streaming event (chunk, tool progress, thinking) to the
    /// session's message channel without persisting anything.
    pub fn emit_streaming_event(
        &self,
        session_id: SessionId,
        event: &str,
        payload: serde_json::Value,
    ) {
        self.bus.emit(&message_channel(session_id), event, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::services::CreateSession;
    use agor_store::Database;
    use agor_types::{AgenticTool, ContentBlock, Role, Session};
    use std::sync::Arc;

    async fn services_with_session() -> (Services, Session) {
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
        (services, session)
    }

    fn text_message(session_id: SessionId, text: &str) -> CreateMessage {
        CreateMessage {
            session_id,
            task_id: None,
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            parent_tool_use_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_indices_are_consecutive() {
        let (services, session) = services_with_session().await;
        for i in 0..4 {
            let message = services
                .create_message(text_message(session.session_id, &format!("m{i}")))
                .await
                .unwrap();
            assert_eq!(message.index, i);
        }

        let messages = services.list_messages(session.session_id).await.unwrap();
        for pair in messages.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
    }

    #[tokio::test]
    async fn test_create_for_deleted_session_is_not_found() {
        let (services, session) = services_with_session().await;
        services.remove_session(session.session_id).await.unwrap();
        let err = services
            .create_message(text_message(session.session_id, "late"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_broadcasts_on_message_channel() {
        let (services, session) = services_with_session().await;
        let mut rx = services.bus().subscribe(&message_channel(session.session_id));

        services
            .create_message(text_message(session.session_id, "hello"))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, channels::events::MESSAGE_CREATE);
        assert_eq!(event.payload["content_preview"], "hello");
    }

    #[tokio::test]
    async fn test_merge_recomputes_preview() {
        let (services, session) = services_with_session().await;
        let message = services
            .create_message(text_message(session.session_id, "part"))
            .await
            .unwrap();

        let merged = services
            .merge_message_content(
                message.message_id,
                vec![ContentBlock::text("part and then some")],
                None,
            )
            .await
            .unwrap();
        assert_eq!(merged.content_preview, "part and then some");
        assert_eq!(merged.index, message.index);
    }
}
