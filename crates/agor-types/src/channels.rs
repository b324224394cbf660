use crate::{BoardId, SessionId, TaskId};

// Real-time bus addressing. A channel is a string room key; event names are
// the `<resource>.<verb>` constants below. Per-channel emission order is
// FIFO; nothing is guaranteed across channels.

/// `sessions:{session_id}` — stop signalling, permission traffic, session patches
pub fn session_channel(session_id: SessionId) -> String {
    format!("sessions:{session_id}")
}

/// `messages:{session_id}` — streaming deltas and message creates
pub fn message_channel(session_id: SessionId) -> String {
    format!("messages:{session_id}")
}

/// `tasks:{task_id}` — task patches
pub fn task_channel(task_id: TaskId) -> String {
    format!("tasks:{task_id}")
}

/// `boards:{board_id}` — worktree and comment updates
pub fn board_channel(board_id: BoardId) -> String {
    format!("boards:{board_id}")
}

/// Bus event names
pub mod events {
    pub const SESSION_CREATE: &str = "session.create";
    pub const SESSION_PATCH: &str = "session.patch";
    pub const SESSION_REMOVE: &str = "session.remove";
    pub const SESSION_CONTEXT_WARNING: &str = "session.context_warning";

    pub const TASK_CREATE: &str = "task.create";
    pub const TASK_PATCH: &str = "task.patch";

    pub const MESSAGE_CREATE: &str = "message.create";
    pub const MESSAGE_PATCH: &str = "message.patch";

    pub const WORKTREE_CREATE: &str = "worktree.create";
    pub const WORKTREE_PATCH: &str = "worktree.patch";
    pub const WORKTREE_REMOVE: &str = "worktree.remove";

    pub const BOARD_COMMENT_CREATE: &str = "board_comment.create";
    pub const BOARD_COMMENT_PATCH: &str = "board_comment.patch";

    pub const TASK_STOP: &str = "task_stop";
    pub const TASK_STOP_ACK: &str = "task_stop_ack";
    pub const PERMISSION_REQUEST: &str = "permission_request";
    pub const PERMISSION_RESOLVED: &str = "permission_resolved";

    pub const STREAMING_START: &str = "streaming:start";
    pub const STREAMING_CHUNK: &str = "streaming:chunk";
    pub const STREAMING_END: &str = "streaming:end";
    pub const THINKING_START: &str = "thinking:start";
    pub const THINKING_CHUNK: &str = "thinking:chunk";
    pub const THINKING_END: &str = "thinking:end";
    pub const TOOL_START: &str = "tool:start";
    pub const TOOL_COMPLETE: &str = "tool:complete";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_keys() {
        let sid = SessionId::new();
        assert_eq!(session_channel(sid), format!("sessions:{sid}"));
        assert_eq!(message_channel(sid), format!("messages:{sid}"));
    }
}
