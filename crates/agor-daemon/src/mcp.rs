use crate::error::Result;
use crate::services::Services;
use agor_types::{McpMergeResult, McpServerConfig, McpTransport, Session, SessionId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Merge the MCP server sets visible to a session.
///
/// Precedence is session > repo > global, keyed by server id: a session
/// link shadows a repo entry of the same id, which shadows a global one.
/// The loopback Agor server is always present and carries the session's
/// own bearer token. (Team scope is not implemented.)
pub fn merge_mcp_servers(
    global: Vec<McpServerConfig>,
    repo: Vec<McpServerConfig>,
    session_scoped: Vec<(McpServerConfig, DateTime<Utc>)>,
    loopback: Option<McpServerConfig>,
) -> McpMergeResult {
    let mut merged: BTreeMap<String, McpServerConfig> = BTreeMap::new();
    let mut newest_addition: Option<DateTime<Utc>> = None;

    for server in global.into_iter().chain(repo) {
        merged.insert(server.server_id.clone(), server);
    }
    for (server, linked_at) in session_scoped {
        newest_addition = Some(newest_addition.map_or(linked_at, |n| n.max(linked_at)));
        merged.insert(server.server_id.clone(), server);
    }
    if let Some(server) = loopback {
        merged.insert(server.server_id.clone(), server);
    }

    let servers: Vec<McpServerConfig> = merged.into_values().collect();
    let mut allowed_tools: Vec<String> = servers
        .iter()
        .flat_map(|server| server.tools.iter().cloned())
        .collect();
    allowed_tools.sort();
    allowed_tools.dedup();

    for server in &servers {
        if let Some(added) = server.added_at {
            newest_addition = Some(newest_addition.map_or(added, |n| n.max(added)));
        }
    }

    McpMergeResult {
        servers,
        allowed_tools,
        newest_addition,
    }
}

impl Services {
    /// Assemble the merged MCP picture for one session from the store
    pub async fn mcp_servers_for_session(&self, session_id: SessionId) -> Result<McpMergeResult> {
        let (session, global, repo, session_scoped) = {
            let store = self.store.lock().await;
            let session = store.get_session(session_id)?;
            let global = store.list_global_mcp_servers()?;
            let repo = match session.worktree_id {
                Some(worktree_id) => match store.find_worktree(worktree_id)? {
                    Some(worktree) => store.list_repo_mcp_servers(&worktree.repo_id)?,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };
            let session_scoped = store.list_session_mcp_servers(session_id)?;
            (session, global, repo, session_scoped)
        };

        let loopback = self.loopback_server(&session);
        Ok(merge_mcp_servers(global, repo, session_scoped, loopback))
    }

    /// The daemon's own MCP endpoint, authenticated per session
    fn loopback_server(&self, session: &Session) -> Option<McpServerConfig> {
        let token = session.mcp_token.as_ref()?;
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        Some(McpServerConfig {
            server_id: "agor".to_string(),
            name: "Agor loopback".to_string(),
            transport: McpTransport::Http {
                url: format!("http://{}/mcp", self.config.listen_addr),
                headers,
            },
            tools: vec![
                "mcp__agor__create_session".to_string(),
                "mcp__agor__list_sessions".to_string(),
                "mcp__agor__post_comment".to_string(),
            ],
            added_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str, tool: &str) -> McpServerConfig {
        McpServerConfig {
            server_id: id.into(),
            name: id.into(),
            transport: McpTransport::Stdio {
                command: format!("{id}-mcp"),
                args: vec![],
                env: Default::default(),
            },
            tools: vec![tool.into()],
            added_at: None,
        }
    }

    #[test]
    fn test_session_scope_shadows_repo_and_global() {
        let global = vec![server("docs", "docs__v1")];
        let repo = vec![server("docs", "docs__v2"), server("ci", "ci__run")];
        let session = vec![(server("docs", "docs__v3"), Utc::now())];

        let merged = merge_mcp_servers(global, repo, session, None);
        assert_eq!(merged.servers.len(), 2);
        let docs = merged
            .servers
            .iter()
            .find(|s| s.server_id == "docs")
            .unwrap();
        assert_eq!(docs.tools, vec!["docs__v3"]);
    }

    #[test]
    fn test_allowed_tools_union_deduped() {
        let global = vec![server("a", "shared"), server("b", "shared")];
        let merged = merge_mcp_servers(global, vec![], vec![], None);
        assert_eq!(merged.allowed_tools, vec!["shared"]);
    }

    #[test]
    fn test_newest_addition_tracks_session_links() {
        let early = Utc::now() - chrono::Duration::hours(2);
        let late = Utc::now();
        let session = vec![(server("a", "t1"), early), (server("b", "t2"), late)];
        let merged = merge_mcp_servers(vec![], vec![], session, None);
        assert_eq!(merged.newest_addition, Some(late));
    }
}
