use crate::{MessageId, Role, SessionId, TaskId, truncate_preview};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One block of message content.
///
/// Mirrors the vendor content-block shape so raw SDK messages survive the
/// round trip through the store without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        tool_use_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
    /// Vendor system notification (compaction progress, init banners, ...)
    SystemStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// True for the system blocks that mark a compaction boundary
    pub fn is_compaction_marker(&self) -> bool {
        match self {
            ContentBlock::SystemStatus {
                system_type,
                status,
                ..
            } => {
                system_type.as_deref() == Some("compaction")
                    || status.as_deref() == Some("compacting")
            }
            _ => false,
        }
    }
}

/// Reference to a tool invocation inside a message, denormalized for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseRef {
    pub tool_use_id: String,
    pub tool_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTokens {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<MessageTokens>,
}

/// Ordered event in a session. Append-only; `index` is gap-free and strictly
/// increasing per session, enforced by the single-writer rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub index: u64,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    /// First 200 chars of concatenated text blocks, whitespace-collapsed
    pub content_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_uses: Option<Vec<ToolUseRef>>,
    /// Set when this message belongs to a nested subagent turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: SessionId, index: u64, role: Role, content: Vec<ContentBlock>) -> Self {
        let content_preview = compute_preview(&content);
        let tool_uses = collect_tool_uses(&content);
        Self {
            message_id: MessageId::new(),
            session_id,
            task_id: None,
            index,
            role,
            content,
            content_preview,
            tool_uses,
            parent_tool_use_id: None,
            metadata: MessageMetadata::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Recompute the derived fields after a streaming-complete merge.
    /// Only `content_preview` and `tool_uses` may change post-creation.
    pub fn refresh_derived(&mut self) {
        self.content_preview = compute_preview(&self.content);
        self.tool_uses = collect_tool_uses(&self.content);
    }

    pub fn has_compaction_marker(&self) -> bool {
        self.role == Role::System && self.content.iter().any(ContentBlock::is_compaction_marker)
    }
}

pub fn compute_preview(content: &[ContentBlock]) -> String {
    let joined = content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ");
    truncate_preview(&joined, 200)
}

fn collect_tool_uses(content: &[ContentBlock]) -> Option<Vec<ToolUseRef>> {
    let uses: Vec<ToolUseRef> = content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse {
                tool_use_id,
                tool_name,
                ..
            } => Some(ToolUseRef {
                tool_use_id: tool_use_id.clone(),
                tool_name: tool_name.clone(),
            }),
            _ => None,
        })
        .collect();
    if uses.is_empty() { None } else { Some(uses) }
}
