use crate::{BoardId, WorktreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A git working directory bound to a branch; the filesystem root an agent
/// runs in. Provisioning is external — the core only tracks the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub worktree_id: WorktreeId,
    pub repo_id: String,
    pub path: PathBuf,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
    #[serde(default)]
    pub archived: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Worktree {
    pub fn new(
        repo_id: impl Into<String>,
        path: impl Into<PathBuf>,
        branch: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            worktree_id: WorktreeId::new(),
            repo_id: repo_id.into(),
            path: path.into(),
            branch: branch.into(),
            board_id: None,
            archived: false,
            created_by: created_by.into(),
            created_at: now,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

/// Comment on a board, with threaded replies and emoji reactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardComment {
    pub comment_id: String,
    pub board_id: BoardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
    pub author: String,
    pub body: String,
    /// emoji → user ids who reacted
    #[serde(default)]
    pub reactions: std::collections::BTreeMap<String, Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl BoardComment {
    /// Toggle `user`'s reaction under `emoji`. Returns true if now present.
    pub fn toggle_reaction(&mut self, emoji: &str, user: &str) -> bool {
        let entry = self.reactions.entry(emoji.to_string()).or_default();
        if let Some(pos) = entry.iter().position(|u| u == user) {
            entry.remove(pos);
            if entry.is_empty() {
                self.reactions.remove(emoji);
            }
            false
        } else {
            entry.push(user.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_reaction() {
        let mut comment = BoardComment {
            comment_id: "c1".into(),
            board_id: BoardId::new(),
            parent_comment_id: None,
            author: "alice".into(),
            body: "ship it".into(),
            reactions: Default::default(),
            created_at: Utc::now(),
        };
        assert!(comment.toggle_reaction("👍", "bob"));
        assert!(!comment.toggle_reaction("👍", "bob"));
        assert!(comment.reactions.is_empty());
    }
}
