use crate::{RequestId, SessionId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Policy for auto-allowing or prompting on tool uses.
///
/// `Ask` is the Agor default; the rest map onto the vendor's own modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    Ask,
    AcceptEdits,
    Plan,
    /// Every tool auto-allowed; the gate never emits a request
    Bypass,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Ask => "ask",
            PermissionMode::AcceptEdits => "accept_edits",
            PermissionMode::Plan => "plan",
            PermissionMode::Bypass => "bypass",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ask" | "default" => Some(PermissionMode::Ask),
            "accept_edits" | "acceptEdits" => Some(PermissionMode::AcceptEdits),
            "plan" => Some(PermissionMode::Plan),
            "bypass" | "bypassPermissions" => Some(PermissionMode::Bypass),
            _ => None,
        }
    }
}

/// How long a remembered allow survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// This tool call only; nothing persisted
    Once,
    /// Written into the session's `permission_config.allowed_tools`
    Session,
    /// Merged into `<worktree>/.claude/settings.json`
    Project,
}

/// Transient state during a tool gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub request_id: RequestId,
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub tool_use_id: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl PermissionRequest {
    pub fn new(
        task_id: TaskId,
        session_id: SessionId,
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        tool_use_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            task_id,
            session_id,
            tool_name: tool_name.into(),
            tool_input,
            tool_use_id: tool_use_id.into(),
            requested_at: Utc::now(),
            decided_by: None,
            decided_at: None,
        }
    }
}

/// Reply to a permission request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub request_id: RequestId,
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PermissionScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome the gate hands back to the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionVerdict {
    Allow,
    Deny { reason: String },
}

impl PermissionVerdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, PermissionVerdict::Allow)
    }
}
