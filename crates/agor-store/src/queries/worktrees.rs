use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{Worktree, WorktreeId};
use rusqlite::{OptionalExtension, params};

impl Database {
    pub fn insert_worktree(&self, worktree: &Worktree) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO worktrees (id, repo_id, path, archived, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                worktree.worktree_id.to_string(),
                worktree.repo_id,
                worktree.path.to_string_lossy(),
                worktree.archived as i64,
                worktree.created_at.to_rfc3339(),
                serde_json::to_string(worktree)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_worktree(&self, worktree: &Worktree) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE worktrees SET repo_id = ?2, path = ?3, archived = ?4, data = ?5 WHERE id = ?1",
            params![
                worktree.worktree_id.to_string(),
                worktree.repo_id,
                worktree.path.to_string_lossy(),
                worktree.archived as i64,
                serde_json::to_string(worktree)?,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "worktree {}",
                worktree.worktree_id
            )));
        }
        Ok(())
    }

    pub fn find_worktree(&self, worktree_id: WorktreeId) -> Result<Option<Worktree>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM worktrees WHERE id = ?1",
                params![worktree_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn get_worktree(&self, worktree_id: WorktreeId) -> Result<Worktree> {
        self.find_worktree(worktree_id)?
            .ok_or_else(|| Error::NotFound(format!("worktree {}", worktree_id)))
    }

    pub fn delete_worktree(&self, worktree_id: WorktreeId) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM worktrees WHERE id = ?1",
            params![worktree_id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("worktree {}", worktree_id)));
        }
        Ok(())
    }

    pub fn list_worktree_owners(&self, worktree_id: WorktreeId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM worktree_owners WHERE worktree_id = ?1 ORDER BY user_id")?;
        let rows = stmt.query_map(params![worktree_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut owners = Vec::new();
        for row in rows {
            owners.push(row?);
        }
        Ok(owners)
    }

    pub fn add_worktree_owner(&self, worktree_id: WorktreeId, user_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO worktree_owners (worktree_id, user_id) VALUES (?1, ?2)",
            params![worktree_id.to_string(), user_id],
        )?;
        Ok(())
    }

    pub fn remove_worktree_owner(&self, worktree_id: WorktreeId, user_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM worktree_owners WHERE worktree_id = ?1 AND user_id = ?2",
            params![worktree_id.to_string(), user_id],
        )?;
        Ok(())
    }
}
