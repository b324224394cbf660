use crate::db::Database;
use crate::error::{Error, Result};
use agor_types::{McpScope, McpServerConfig, SessionId};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl Database {
    /// Register a server in the catalog. Duplicate ids are a conflict.
    pub fn insert_mcp_server(
        &self,
        server: &McpServerConfig,
        scope: McpScope,
        repo_id: Option<&str>,
    ) -> Result<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO mcp_servers (id, scope, repo_id, enabled, added_at, data)
            VALUES (?1, ?2, ?3, 1, ?4, ?5)
            "#,
            params![
                server.server_id,
                scope_str(scope),
                repo_id,
                server.added_at.map(|ts| ts.to_rfc3339()),
                serde_json::to_string(server)?,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!(
                    "mcp server {} already registered",
                    server.server_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_global_mcp_servers(&self) -> Result<Vec<McpServerConfig>> {
        self.list_mcp_by_scope("global", None)
    }

    pub fn list_repo_mcp_servers(&self, repo_id: &str) -> Result<Vec<McpServerConfig>> {
        self.list_mcp_by_scope("repo", Some(repo_id))
    }

    fn list_mcp_by_scope(
        &self,
        scope: &str,
        repo_id: Option<&str>,
    ) -> Result<Vec<McpServerConfig>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM mcp_servers
             WHERE scope = ?1 AND enabled = 1 AND (?2 IS NULL OR repo_id = ?2)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![scope, repo_id], |row| row.get::<_, String>(0))?;
        let mut servers = Vec::new();
        for row in rows {
            servers.push(serde_json::from_str(&row?)?);
        }
        Ok(servers)
    }

    /// Link a catalog server into a session scope. Idempotent on the pair.
    pub fn link_session_mcp_server(
        &self,
        session_id: SessionId,
        server_id: &str,
        added_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO session_mcp_servers (session_id, server_id, added_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![session_id.to_string(), server_id, added_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn unlink_session_mcp_server(&self, session_id: SessionId, server_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM session_mcp_servers WHERE session_id = ?1 AND server_id = ?2",
            params![session_id.to_string(), server_id],
        )?;
        Ok(())
    }

    /// Session-scoped servers with their link timestamps (the staleness input)
    pub fn list_session_mcp_servers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<(McpServerConfig, DateTime<Utc>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.data, l.added_at FROM session_mcp_servers l
             JOIN mcp_servers m ON m.id = l.server_id
             WHERE l.session_id = ?1 AND m.enabled = 1
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map(params![session_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut servers = Vec::new();
        for row in rows {
            let (data, added_at) = row?;
            let config: McpServerConfig = serde_json::from_str(&data)?;
            let ts = DateTime::parse_from_rfc3339(&added_at)
                .map_err(|e| Error::Conflict(format!("bad added_at timestamp: {e}")))?
                .with_timezone(&Utc);
            servers.push((config, ts));
        }
        Ok(servers)
    }
}

fn scope_str(scope: McpScope) -> &'static str {
    match scope {
        McpScope::Global => "global",
        McpScope::Repo => "repo",
        McpScope::Session => "session",
    }
}
