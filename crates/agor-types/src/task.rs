use crate::{NormalizedSdkData, PermissionRequest, SessionId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    AwaitingPermission,
    Completed,
    Failed,
    Cancelled,
    Stopped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::AwaitingPermission => "awaiting_permission",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Stopped => "stopped",
        }
    }

    /// Terminal states set `completed_at` and release the active-task slot
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Stopped
        )
    }

    /// States that count as "active" for the one-active-task invariant
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::AwaitingPermission)
    }
}

/// One prompt→completion attempt within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Current pending gate, present only while `awaiting_permission`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_request: Option<PermissionRequest>,
    /// Vendor's final result object, verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sdk_response: Option<serde_json::Value>,
    /// Immutable once written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_sdk_response: Option<NormalizedSdkData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_context_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl Task {
    pub fn new(session_id: SessionId, created_by: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::new(),
            session_id,
            status: TaskStatus::Queued,
            model: None,
            permission_request: None,
            raw_sdk_response: None,
            normalized_sdk_response: None,
            computed_context_window: None,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
            created_by: created_by.into(),
        }
    }
}

/// Partial update applied through the service layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_request: Option<Option<PermissionRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sdk_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_sdk_response: Option<NormalizedSdkData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_context_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::AwaitingPermission.is_terminal());
    }

    #[test]
    fn test_active_states() {
        assert!(TaskStatus::Running.is_active());
        assert!(TaskStatus::AwaitingPermission.is_active());
        assert!(!TaskStatus::Queued.is_active());
        assert!(!TaskStatus::Cancelled.is_active());
    }
}
