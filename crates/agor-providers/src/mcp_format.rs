use agor_types::{McpMergeResult, McpTransport};
use serde_json::{Map, Value, json};

/// Render the merged MCP set in the `mcpServers` config shape understood by
/// the claude/codex/opencode CLIs. Auth header values come in already
/// resolved; they must not be logged by callers.
pub fn to_mcp_servers_config(mcp: &McpMergeResult) -> Value {
    let mut servers = Map::new();
    for server in &mcp.servers {
        let entry = match &server.transport {
            McpTransport::Stdio { command, args, env } => json!({
                "command": command,
                "args": args,
                "env": env,
            }),
            McpTransport::Http { url, headers } => json!({
                "type": "http",
                "url": url,
                "headers": headers,
            }),
        };
        servers.insert(server.server_id.clone(), entry);
    }
    json!({ "mcpServers": servers })
}
