use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "agor", version, about = "Control plane for autonomous coding agents")]
pub struct Cli {
    /// Daemon address for client commands
    #[arg(long, global = true, default_value = "127.0.0.1:7733")]
    pub daemon_url: String,

    /// Client auth token (must match the daemon's configured token)
    #[arg(long, global = true, default_value = "agor-local")]
    pub token: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the daemon in the foreground
    Daemon {
        /// Config file (TOML); defaults apply when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Manage sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Submit a prompt and stream the session until the task finishes
    Prompt {
        session_id: String,
        prompt: String,
        #[arg(long)]
        permission_mode: Option<String>,
    },

    /// Stop a session's active task
    Stop {
        session_id: String,
        task_id: String,
    },

    /// Reply to a pending permission request
    Permission {
        request_id: String,
        /// Allow the tool (omit to deny)
        #[arg(long)]
        allow: bool,
        /// Remember scope: once, session, project
        #[arg(long, default_value = "once")]
        scope: String,
    },

    /// Manage worktrees
    #[command(subcommand)]
    Worktree(WorktreeCommand),
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Create a session
    Create {
        /// One of: claude-code, codex, gemini, opencode
        #[arg(long, default_value = "claude-code")]
        tool: String,
        #[arg(long)]
        worktree_id: Option<String>,
        #[arg(long, default_value = "cli")]
        created_by: String,
    },
    /// List sessions
    List {
        #[arg(long)]
        tool: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Remove a session (cascades to tasks and messages)
    Remove { session_id: String },
}

#[derive(Subcommand, Debug)]
pub enum WorktreeCommand {
    Create {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long, default_value = "cli")]
        created_by: String,
    },
    Archive { worktree_id: String },
    Unarchive { worktree_id: String },
}
