use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{AgenticTool, Session, SessionId, SessionStatus, WorktreeId};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

/// Filters applied by `list_sessions`; all optional, AND-combined
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub tool: Option<AgenticTool>,
    pub status: Option<SessionStatus>,
    pub worktree_id: Option<WorktreeId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub include_archived: bool,
}

impl Database {
    pub fn insert_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (id, worktree_id, tool, status, created_at, last_updated, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                session.session_id.to_string(),
                session.worktree_id.map(|id| id.to_string()),
                session.agentic_tool.as_str(),
                session.status.as_str(),
                session.created_at.to_rfc3339(),
                session.last_updated.to_rfc3339(),
                serde_json::to_string(session)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_session(&self, session: &Session) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE sessions
            SET worktree_id = ?2, tool = ?3, status = ?4, last_updated = ?5, data = ?6
            WHERE id = ?1
            "#,
            params![
                session.session_id.to_string(),
                session.worktree_id.map(|id| id.to_string()),
                session.agentic_tool.as_str(),
                session.status.as_str(),
                session.last_updated.to_rfc3339(),
                serde_json::to_string(session)?,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("session {}", session.session_id)));
        }
        Ok(())
    }

    pub fn get_session(&self, session_id: SessionId) -> Result<Session> {
        self.find_session(session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))
    }

    pub fn find_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM sessions WHERE id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Deleting a session cascades to its tasks and messages
    pub fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }

    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM sessions ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for row in rows {
            let session: Session = serde_json::from_str(&row?)?;
            sessions.push(session);
        }

        if !filter.include_archived {
            sessions.retain(|s| !s.archived);
        }
        if let Some(tool) = filter.tool {
            sessions.retain(|s| s.agentic_tool == tool);
        }
        if let Some(status) = filter.status {
            sessions.retain(|s| s.status == status);
        }
        if let Some(worktree_id) = filter.worktree_id {
            sessions.retain(|s| s.worktree_id == Some(worktree_id));
        }
        if let Some(since) = filter.since {
            sessions.retain(|s| s.created_at >= since);
        }
        if let Some(until) = filter.until {
            sessions.retain(|s| s.created_at <= until);
        }
        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_crud() {
        let db = Database::open_in_memory().unwrap();
        let mut session = Session::new(AgenticTool::ClaudeCode, "tester");
        db.insert_session(&session).unwrap();

        let loaded = db.get_session(session.session_id).unwrap();
        assert_eq!(loaded.created_by, "tester");

        session.status = SessionStatus::Running;
        db.update_session(&session).unwrap();
        let loaded = db.get_session(session.session_id).unwrap();
        assert_eq!(loaded.status, SessionStatus::Running);

        db.delete_session(session.session_id).unwrap();
        assert!(db.find_session(session.session_id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_session_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(AgenticTool::Codex, "tester");
        let err = db.update_session(&session).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_filters_by_tool() {
        let db = Database::open_in_memory().unwrap();
        db.insert_session(&Session::new(AgenticTool::ClaudeCode, "a"))
            .unwrap();
        db.insert_session(&Session::new(AgenticTool::Gemini, "b"))
            .unwrap();

        let filter = SessionFilter {
            tool: Some(AgenticTool::Gemini),
            ..Default::default()
        };
        let sessions = db.list_sessions(&filter).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].created_by, "b");
    }
}
