use super::Services;
use crate::error::{Error, Result};
use agor_types::{BoardComment, BoardId, board_channel, channels};
use chrono::Utc;
use uuid::Uuid;

impl Services {
    /// Reply to a board comment (or start a thread when `parent` is None)
    pub async fn reply_board_comment(
        &self,
        board_id: BoardId,
        parent_comment_id: Option<String>,
        author: String,
        body: String,
    ) -> Result<BoardComment> {
        if body.trim().is_empty() {
            return Err(Error::Validation("comment body is empty".into()));
        }

        let comment = BoardComment {
            comment_id: Uuid::now_v7().to_string(),
            board_id,
            parent_comment_id,
            author,
            body,
            reactions: Default::default(),
            created_at: Utc::now(),
        };
        {
            let store = self.store.lock().await;
            if let Some(parent_id) = &comment.parent_comment_id
                && store.find_board_comment(parent_id)?.is_none()
            {
                return Err(Error::NotFound(format!("comment {parent_id}")));
            }
            store.insert_board_comment(&comment)?;
        }

        self.bus.emit(
            &board_channel(board_id),
            channels::events::BOARD_COMMENT_CREATE,
            serde_json::to_value(&comment)?,
        );
        Ok(comment)
    }

    pub async fn toggle_comment_reaction(
        &self,
        comment_id: &str,
        emoji: &str,
        user: &str,
    ) -> Result<BoardComment> {
        let comment = {
            let store = self.store.lock().await;
            let mut comment = store
                .find_board_comment(comment_id)?
                .ok_or_else(|| Error::NotFound(format!("comment {comment_id}")))?;
            comment.toggle_reaction(emoji, user);
            store.update_board_comment(&comment)?;
            comment
        };

        self.bus.emit(
            &board_channel(comment.board_id),
            channels::events::BOARD_COMMENT_PATCH,
            serde_json::to_value(&comment)?,
        );
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use agor_store::Database;
    use std::sync::Arc;

    fn services() -> Services {
        let store = Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()));
        Services::new(
            store,
            crate::bus::EventBus::new(),
            Arc::new(DaemonConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_reply_and_toggle() {
        let services = services();
        let board = BoardId::new();

        let root = services
            .reply_board_comment(board, None, "alice".into(), "first".into())
            .await
            .unwrap();
        let reply = services
            .reply_board_comment(
                board,
                Some(root.comment_id.clone()),
                "bob".into(),
                "agreed".into(),
            )
            .await
            .unwrap();
        assert_eq!(reply.parent_comment_id.as_deref(), Some(root.comment_id.as_str()));

        let reacted = services
            .toggle_comment_reaction(&root.comment_id, "🚀", "bob")
            .await
            .unwrap();
        assert_eq!(reacted.reactions["🚀"], vec!["bob"]);

        let unreacted = services
            .toggle_comment_reaction(&root.comment_id, "🚀", "bob")
            .await
            .unwrap();
        assert!(unreacted.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent_rejected() {
        let services = services();
        let err = services
            .reply_board_comment(BoardId::new(), Some("ghost".into()), "a".into(), "hi".into())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
