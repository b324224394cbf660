use crate::thinking::ThinkingBudget;
use agor_types::{McpMergeResult, PermissionMode, Session, TaskId};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything a driver needs to run one prompt, resolved up front by the
/// executor so the driver itself stays free of store lookups.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub session: Session,
    pub task_id: TaskId,
    pub prompt: String,
    pub model: String,
    pub permission_mode: PermissionMode,
    pub working_dir: PathBuf,
    pub thinking_budget: ThinkingBudget,
    pub mcp: McpMergeResult,
    pub resume: ResumeDecision,
    /// Extra environment for vendor subprocesses (user-config wins over
    /// system env; resolved by the daemon at spawn time)
    pub env: BTreeMap<String, String>,
}

/// How the driver enters the vendor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Start a brand-new vendor session
    Fresh,
    /// Continue the session's own vendor conversation
    Resume { sdk_session_id: String },
    /// Resume the parent's conversation under a fork flag; the vendor
    /// mints a new id for us
    Fork { parent_sdk_session_id: String },
}

/// Resolve the directory the agent will run in.
///
/// Preference order: explicit override (container execution with worktrees
/// bind-mounted at an alternate path) → worktree path → process cwd. The
/// cwd fallback is logged: running an agent outside a worktree is almost
/// always a provisioning bug.
pub fn resolve_working_dir(
    cwd_override: Option<&Path>,
    worktree_path: Option<&Path>,
) -> PathBuf {
    if let Some(dir) = cwd_override {
        return dir.to_path_buf();
    }
    if let Some(dir) = worktree_path {
        return dir.to_path_buf();
    }
    let fallback = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    warn!(
        dir = %fallback.display(),
        "no worktree path for session; falling back to process cwd"
    );
    fallback
}

/// Sanity-check the resolved working directory. Missing directories are an
/// error; a missing `.git` only warns (bare scratch dirs are legal).
pub fn validate_working_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("working directory does not exist: {}", dir.display());
    }
    if !dir.join(".git").exists() {
        warn!(dir = %dir.display(), "working directory has no .git; agent runs outside a worktree");
    }
    Ok(())
}

const SDK_SESSION_MAX_AGE_HOURS: i64 = 24;

/// A vendor continuation token is unusable when the conversation it points
/// at has drifted from reality: too old, worktree gone, or MCP servers were
/// added after the vendor last saw the session.
pub fn is_sdk_session_stale(
    session: &Session,
    worktree_exists: bool,
    newest_mcp_addition: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if session.sdk_session_id.is_none() {
        return false;
    }
    if now - session.last_updated > Duration::hours(SDK_SESSION_MAX_AGE_HOURS) {
        return true;
    }
    if session.worktree_id.is_some() && !worktree_exists {
        return true;
    }
    if let Some(added) = newest_mcp_addition
        && added > session.last_updated
    {
        return true;
    }
    false
}

/// Fork / spawn / resume decision for one prompt.
///
/// Fork wins when the session was forked and has no vendor id of its own
/// yet; spawn explicitly starts fresh; otherwise the session's own id is
/// resumed unless stale.
pub fn resolve_resume(
    session: &Session,
    parent_sdk_session_id: Option<&str>,
    worktree_exists: bool,
    newest_mcp_addition: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ResumeDecision {
    if session.sdk_session_id.is_none() {
        if session.genealogy.is_fork() {
            if let Some(parent_id) = parent_sdk_session_id {
                return ResumeDecision::Fork {
                    parent_sdk_session_id: parent_id.to_string(),
                };
            }
            // Fork of a session that never ran: nothing to resume
            return ResumeDecision::Fresh;
        }
        // Spawn or plain first prompt
        return ResumeDecision::Fresh;
    }

    if is_sdk_session_stale(session, worktree_exists, newest_mcp_addition, now) {
        return ResumeDecision::Fresh;
    }

    match &session.sdk_session_id {
        Some(id) => ResumeDecision::Resume {
            sdk_session_id: id.clone(),
        },
        None => ResumeDecision::Fresh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agor_types::{AgenticTool, Genealogy, SessionId};

    fn session() -> Session {
        Session::new(AgenticTool::ClaudeCode, "tester")
    }

    #[test]
    fn test_fork_resumes_parent_with_fork_flag() {
        let parent = SessionId::new();
        let mut forked = session();
        forked.genealogy = Genealogy {
            parent_session_id: Some(parent),
            forked_from_session_id: Some(parent),
        };

        let decision = resolve_resume(&forked, Some("a0"), true, None, Utc::now());
        assert_eq!(decision, ResumeDecision::Fork {
            parent_sdk_session_id: "a0".into()
        });
    }

    #[test]
    fn test_spawn_never_resumes_parent() {
        let mut spawned = session();
        spawned.genealogy = Genealogy {
            parent_session_id: Some(SessionId::new()),
            forked_from_session_id: None,
        };

        let decision = resolve_resume(&spawned, Some("a0"), true, None, Utc::now());
        assert_eq!(decision, ResumeDecision::Fresh);
    }

    #[test]
    fn test_own_id_resumes() {
        let mut s = session();
        s.sdk_session_id = Some("own-1".into());

        let decision = resolve_resume(&s, None, true, None, Utc::now());
        assert_eq!(decision, ResumeDecision::Resume {
            sdk_session_id: "own-1".into()
        });
    }

    #[test]
    fn test_fork_with_own_id_resumes_self() {
        // Second prompt on a fork: the fork already has its minted id
        let parent = SessionId::new();
        let mut forked = session();
        forked.genealogy = Genealogy {
            parent_session_id: Some(parent),
            forked_from_session_id: Some(parent),
        };
        forked.sdk_session_id = Some("minted".into());

        let decision = resolve_resume(&forked, Some("a0"), true, None, Utc::now());
        assert_eq!(decision, ResumeDecision::Resume {
            sdk_session_id: "minted".into()
        });
    }

    #[test]
    fn test_stale_age_clears_resume() {
        let mut s = session();
        s.sdk_session_id = Some("old".into());
        let now = s.last_updated + Duration::hours(25);

        assert!(is_sdk_session_stale(&s, true, None, now));
        assert_eq!(resolve_resume(&s, None, true, None, now), ResumeDecision::Fresh);
    }

    #[test]
    fn test_missing_worktree_is_stale() {
        let mut s = session();
        s.worktree_id = Some(agor_types::WorktreeId::new());
        s.sdk_session_id = Some("id".into());
        assert!(is_sdk_session_stale(&s, false, None, Utc::now()));
    }

    #[test]
    fn test_mcp_addition_after_update_is_stale() {
        let mut s = session();
        s.sdk_session_id = Some("id".into());
        let added = s.last_updated + Duration::minutes(5);
        assert!(is_sdk_session_stale(&s, true, Some(added), Utc::now()));
    }

    #[test]
    fn test_fresh_session_not_stale() {
        let s = session();
        assert!(!is_sdk_session_stale(&s, true, None, Utc::now()));
    }

    #[test]
    fn test_working_dir_prefers_override() {
        let dir = resolve_working_dir(Some(Path::new("/mnt/wt")), Some(Path::new("/home/wt")));
        assert_eq!(dir, PathBuf::from("/mnt/wt"));
    }
}
