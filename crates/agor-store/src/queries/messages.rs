use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{Message, MessageId, SessionId};
use rusqlite::{OptionalExtension, params};

impl Database {
    /// Insert a message at its caller-allocated index.
    /// The `UNIQUE (session_id, idx)` constraint turns an index collision
    /// into a `Conflict` — under the single-writer rule it never fires.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO messages (id, session_id, task_id, idx, role, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                message.message_id.to_string(),
                message.session_id.to_string(),
                message.task_id.map(|id| id.to_string()),
                message.index as i64,
                message.role.as_str(),
                message.timestamp.to_rfc3339(),
                serde_json::to_string(message)?,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!(
                    "message index {} already taken in session {}",
                    message.index, message.session_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Streaming-complete merge: replace content within the same message id
    pub fn update_message(&self, message: &Message) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE messages SET data = ?2 WHERE id = ?1",
            params![
                message.message_id.to_string(),
                serde_json::to_string(message)?,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("message {}", message.message_id)));
        }
        Ok(())
    }

    pub fn find_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM messages WHERE id = ?1",
                params![message_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// All messages for a session in index order
    pub fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM messages WHERE session_id = ?1 ORDER BY idx ASC")?;
        let rows = stmt.query_map(params![session_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(serde_json::from_str(&row?)?);
        }
        Ok(messages)
    }

    /// Next free index for a session: `max(existing) + 1`, 0 when empty
    pub fn next_message_index(&self, session_id: SessionId) -> Result<u64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(idx) FROM messages WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(max.map(|m| m as u64 + 1).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agor_types::{AgenticTool, ContentBlock, Role, Session};

    fn session_with_db() -> (Database, Session) {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(AgenticTool::ClaudeCode, "tester");
        db.insert_session(&session).unwrap();
        (db, session)
    }

    #[test]
    fn test_index_allocation_starts_at_zero() {
        let (db, session) = session_with_db();
        assert_eq!(db.next_message_index(session.session_id).unwrap(), 0);

        let message = Message::new(session.session_id, 0, Role::User, vec![ContentBlock::text(
            "hello",
        )]);
        db.insert_message(&message).unwrap();
        assert_eq!(db.next_message_index(session.session_id).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_index_is_conflict() {
        let (db, session) = session_with_db();
        let first = Message::new(session.session_id, 0, Role::User, vec![ContentBlock::text(
            "a",
        )]);
        let second = Message::new(session.session_id, 0, Role::User, vec![ContentBlock::text(
            "b",
        )]);
        db.insert_message(&first).unwrap();
        let err = db.insert_message(&second).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_messages_listed_in_index_order() {
        let (db, session) = session_with_db();
        for i in [2u64, 0, 1] {
            let message = Message::new(session.session_id, i, Role::Assistant, vec![
                ContentBlock::text(format!("m{i}")),
            ]);
            db.insert_message(&message).unwrap();
        }
        let messages = db.list_messages(session.session_id).unwrap();
        let indices: Vec<u64> = messages.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_streaming_merge_updates_content() {
        let (db, session) = session_with_db();
        let mut message = Message::new(session.session_id, 0, Role::Assistant, vec![
            ContentBlock::text("partial"),
        ]);
        db.insert_message(&message).unwrap();

        message.content = vec![ContentBlock::text("partial plus the rest")];
        message.refresh_derived();
        db.update_message(&message).unwrap();

        let loaded = db.find_message(message.message_id).unwrap().unwrap();
        assert_eq!(loaded.content_preview, "partial plus the rest");
    }
}
