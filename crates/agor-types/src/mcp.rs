use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an MCP server entry came from. Later scopes override earlier ones
/// when merging: session > repo > global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpScope {
    Global,
    Repo,
    Session,
}

/// Transport for reaching an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpTransport {
    /// Out-of-band command, spoken to over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint
    Http {
        url: String,
        /// Header name → secret reference, resolved at spawn time.
        /// Resolved values must never be logged.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

/// One MCP server definition as the catalog hands it to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Stable server id; the merge key across scopes
    pub server_id: String,
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransport,
    /// Tools this server declares; feeds the merged allowed_tools union
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// Merged per-session MCP picture handed to the prompt driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpMergeResult {
    pub servers: Vec<McpServerConfig>,
    /// Union of every included server's declared tools
    pub allowed_tools: Vec<String>,
    /// Newest `added_at` across the merged set; staleness input for resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_addition: Option<DateTime<Utc>>,
}
