use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{SessionId, Task, TaskId, TaskStatus};
use rusqlite::{OptionalExtension, params};

impl Database {
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO tasks (id, session_id, status, created_at, completed_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                task.task_id.to_string(),
                task.session_id.to_string(),
                task.status.as_str(),
                task.created_at.to_rfc3339(),
                task.completed_at.map(|ts| ts.to_rfc3339()),
                serde_json::to_string(task)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_task(&self, task: &Task) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE tasks
            SET status = ?2, completed_at = ?3, data = ?4
            WHERE id = ?1
            "#,
            params![
                task.task_id.to_string(),
                task.status.as_str(),
                task.completed_at.map(|ts| ts.to_rfc3339()),
                serde_json::to_string(task)?,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("task {}", task.task_id)));
        }
        Ok(())
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<Task> {
        self.find_task(task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
    }

    pub fn find_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM tasks WHERE id = ?1",
                params![task_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Tasks for a session, chronologically ascending
    pub fn list_tasks(&self, session_id: SessionId, limit: usize) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM tasks WHERE session_id = ?1 ORDER BY created_at ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id.to_string(), limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(serde_json::from_str(&row?)?);
        }
        Ok(tasks)
    }

    /// Prior completed tasks for a session, chronologically ascending.
    /// Bounded: the context-window computation never scans past `limit`.
    pub fn list_completed_tasks(&self, session_id: SessionId, limit: usize) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM tasks WHERE session_id = ?1 AND status = ?2
             ORDER BY created_at ASC LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![
                session_id.to_string(),
                TaskStatus::Completed.as_str(),
                limit as i64
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(serde_json::from_str(&row?)?);
        }
        Ok(tasks)
    }

    /// The session's active task (running or awaiting permission), if any
    pub fn find_active_task(&self, session_id: SessionId) -> Result<Option<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM tasks WHERE session_id = ?1 AND status IN (?2, ?3) LIMIT 1",
        )?;
        let mut rows = stmt.query_map(
            params![
                session_id.to_string(),
                TaskStatus::Running.as_str(),
                TaskStatus::AwaitingPermission.as_str()
            ],
            |row| row.get::<_, String>(0),
        )?;
        match rows.next() {
            Some(row) => Ok(Some(serde_json::from_str(&row?)?)),
            None => Ok(None),
        }
    }

    /// Any non-terminal task, queued included. Guards the active-task slot
    /// across the queued→running handoff window.
    pub fn find_open_task(&self, session_id: SessionId) -> Result<Option<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM tasks WHERE session_id = ?1 AND status IN (?2, ?3, ?4) LIMIT 1",
        )?;
        let mut rows = stmt.query_map(
            params![
                session_id.to_string(),
                TaskStatus::Queued.as_str(),
                TaskStatus::Running.as_str(),
                TaskStatus::AwaitingPermission.as_str()
            ],
            |row| row.get::<_, String>(0),
        )?;
        match rows.next() {
            Some(row) => Ok(Some(serde_json::from_str(&row?)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agor_types::{AgenticTool, Session};
    use chrono::Utc;

    fn session_with_db() -> (Database, Session) {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(AgenticTool::ClaudeCode, "tester");
        db.insert_session(&session).unwrap();
        (db, session)
    }

    #[test]
    fn test_task_crud() {
        let (db, session) = session_with_db();
        let mut task = Task::new(session.session_id, "tester");
        db.insert_task(&task).unwrap();

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        db.update_task(&task).unwrap();

        let loaded = db.get_task(task.task_id).unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn test_completed_tasks_ordered_and_filtered(){
        let (db, session) = session_with_db();
        for status in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Completed] {
            let mut task = Task::new(session.session_id, "tester");
            task.status = status;
            db.insert_task(&task).unwrap();
        }

        let completed = db.list_completed_tasks(session.session_id, 100).unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed[0].created_at <= completed[1].created_at);
    }

    #[test]
    fn test_find_active_task() {
        let (db, session) = session_with_db();
        assert!(db.find_active_task(session.session_id).unwrap().is_none());

        let mut task = Task::new(session.session_id, "tester");
        task.status = TaskStatus::AwaitingPermission;
        db.insert_task(&task).unwrap();

        let active = db.find_active_task(session.session_id).unwrap().unwrap();
        assert_eq!(active.task_id, task.task_id);
    }

    #[test]
    fn test_session_delete_cascades_tasks() {
        let (db, session) = session_with_db();
        let task = Task::new(session.session_id, "tester");
        db.insert_task(&task).unwrap();

        db.delete_session(session.session_id).unwrap();
        assert!(db.find_task(task.task_id).unwrap().is_none());
    }
}
