use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{BoardComment, BoardId};
use rusqlite::{OptionalExtension, params};

impl Database {
    pub fn insert_board_comment(&self, comment: &BoardComment) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO board_comments (id, board_id, parent_id, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                comment.comment_id,
                comment.board_id.to_string(),
                comment.parent_comment_id,
                comment.created_at.to_rfc3339(),
                serde_json::to_string(comment)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_board_comment(&self, comment: &BoardComment) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE board_comments SET data = ?2 WHERE id = ?1",
            params![comment.comment_id, serde_json::to_string(comment)?],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("comment {}", comment.comment_id)));
        }
        Ok(())
    }

    pub fn find_board_comment(&self, comment_id: &str) -> Result<Option<BoardComment>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM board_comments WHERE id = ?1",
                params![comment_id],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn list_board_comments(&self, board_id: BoardId) -> Result<Vec<BoardComment>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM board_comments WHERE board_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![board_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(serde_json::from_str(&row?)?);
        }
        Ok(comments)
    }
}
