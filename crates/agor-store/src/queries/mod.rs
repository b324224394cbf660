mod boards;
mod mcp;
mod messages;
mod sessions;
mod tasks;
mod worktrees;

pub use sessions::SessionFilter;
