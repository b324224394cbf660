pub mod channels;
mod ids;
mod mcp;
mod message;
mod permission;
mod protocol;
mod sdk;
mod session;
mod task;
mod util;
mod worktree;

pub use channels::*;
pub use ids::*;
pub use mcp::*;
pub use message::*;
pub use permission::*;
pub use protocol::*;
pub use sdk::*;
pub use session::*;
pub use task::*;
pub use util::*;
pub use worktree::*;

use serde::{Deserialize, Serialize};

/// Agentic tool (vendor SDK) backing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgenticTool {
    ClaudeCode,
    Gemini,
    Codex,
    Opencode,
}

impl AgenticTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgenticTool::ClaudeCode => "claude-code",
            AgenticTool::Gemini => "gemini",
            AgenticTool::Codex => "codex",
            AgenticTool::Opencode => "opencode",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "claude-code" | "claude" => Some(AgenticTool::ClaudeCode),
            "gemini" => Some(AgenticTool::Gemini),
            "codex" => Some(AgenticTool::Codex),
            "opencode" => Some(AgenticTool::Opencode),
            _ => None,
        }
    }
}

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}
