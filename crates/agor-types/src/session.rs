use crate::{AgenticTool, PermissionMode, SessionId, WorktreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Stopping,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Stopping => "stopping",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// Extended-thinking budget policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    #[default]
    Auto,
    Manual,
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: Option<String>,
    #[serde(default)]
    pub thinking_mode: ThinkingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_thinking_tokens: Option<u32>,
}

/// Permission policy plus the remembered per-session allow set.
///
/// `allowed_tools` is a set: inserting an already-present tool is a no-op,
/// which keeps session-scope "remember" idempotent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub mode: PermissionMode,
    #[serde(default)]
    pub allowed_tools: BTreeSet<String>,
}

impl PermissionConfig {
    pub fn is_allowed(&self, tool_name: &str) -> bool {
        self.allowed_tools.contains(tool_name)
    }

    /// Insert a remembered tool. Returns false if it was already present.
    pub fn remember(&mut self, tool_name: impl Into<String>) -> bool {
        self.allowed_tools.insert(tool_name.into())
    }
}

/// Fork/spawn ancestry links.
///
/// `forked_from_session_id` and `parent_session_id` are not mutually
/// exclusive: a fork records both. The driver treats "fork" as
/// resume-from-parent-with-new-id and "spawn" as fresh-context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genealogy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from_session_id: Option<SessionId>,
}

impl Genealogy {
    pub fn is_fork(&self) -> bool {
        self.forked_from_session_id.is_some()
    }

    pub fn is_spawn(&self) -> bool {
        self.parent_session_id.is_some() && self.forked_from_session_id.is_none()
    }
}

/// The conversational unit: a persistent multi-turn conversation with one
/// agent, scoped to a worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    /// Nullable: a session may be created before its workspace exists
    pub worktree_id: Option<WorktreeId>,
    pub agentic_tool: AgenticTool,
    pub status: SessionStatus,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default)]
    pub permission_config: PermissionConfig,
    /// Vendor's opaque continuation token; cleared on staleness detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_session_id: Option<String>,
    /// Per-session bearer for the loopback Agor MCP server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_token: Option<String>,
    #[serde(default)]
    pub genealogy: Genealogy,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Transient: true when the session is waiting for user input
    #[serde(default)]
    pub ready_for_prompt: bool,
    /// Hidden from default listings; the record and its history remain
    #[serde(default)]
    pub archived: bool,
}

impl Session {
    pub fn new(agentic_tool: AgenticTool, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            worktree_id: None,
            agentic_tool,
            status: SessionStatus::Idle,
            model_config: ModelConfig::default(),
            permission_config: PermissionConfig::default(),
            sdk_session_id: None,
            mcp_token: None,
            genealogy: Genealogy::default(),
            created_by: created_by.into(),
            created_at: now,
            last_updated: now,
            ready_for_prompt: true,
            archived: false,
        }
    }
}

/// Partial update applied through the service layer.
///
/// `None` means "leave unchanged"; nested options use a double wrap so a
/// field can be explicitly cleared (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_id: Option<Option<WorktreeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_config: Option<ModelConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_config: Option<PermissionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_session_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_for_prompt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_tools_set_semantics() {
        let mut config = PermissionConfig::default();
        assert!(config.remember("Bash"));
        assert!(!config.remember("Bash"));
        assert_eq!(config.allowed_tools.len(), 1);
        assert!(config.is_allowed("Bash"));
        assert!(!config.is_allowed("Write"));
    }

    #[test]
    fn test_genealogy_fork_vs_spawn() {
        let parent = SessionId::new();

        let fork = Genealogy {
            parent_session_id: Some(parent),
            forked_from_session_id: Some(parent),
        };
        assert!(fork.is_fork());
        assert!(!fork.is_spawn());

        let spawn = Genealogy {
            parent_session_id: Some(parent),
            forked_from_session_id: None,
        };
        assert!(!spawn.is_fork());
        assert!(spawn.is_spawn());
    }

    #[test]
    fn test_session_roundtrip() {
        let session = Session::new(AgenticTool::ClaudeCode, "tester");
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, session.session_id);
        assert_eq!(back.status, SessionStatus::Idle);
    }
}
