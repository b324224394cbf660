use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// Project-scope permission persistence: the allow-list lives in the
// worktree at `.claude/settings.json` so it travels with the repo.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub permissions: ProjectPermissions,
    /// Unknown keys written by other tools are preserved verbatim
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPermissions {
    #[serde(default)]
    pub allow: AllowList,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowList {
    #[serde(default)]
    pub tools: Vec<String>,
}

fn settings_path(worktree: &Path) -> PathBuf {
    worktree.join(".claude").join("settings.json")
}

fn read_settings(worktree: &Path) -> Result<ProjectSettings> {
    let path = settings_path(worktree);
    match std::fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("malformed settings at {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectSettings::default()),
        Err(e) => Err(e.into()),
    }
}

/// Allow/deny sets persisted in the worktree, loaded once at gate setup
pub fn load_project_permissions(worktree: &Path) -> (BTreeSet<String>, BTreeSet<String>) {
    match read_settings(worktree) {
        Ok(settings) => (
            settings.permissions.allow.tools.into_iter().collect(),
            settings.permissions.deny.into_iter().collect(),
        ),
        Err(_) => (BTreeSet::new(), BTreeSet::new()),
    }
}

/// Remember a tool at project scope: read–modify–write with mkdir -p.
/// Last writer wins across processes; the write is atomic via tmp+rename
/// so readers never observe a torn file.
pub fn remember_project_tool(worktree: &Path, tool_name: &str) -> Result<()> {
    let mut settings = read_settings(worktree)?;
    if !settings
        .permissions
        .allow
        .tools
        .iter()
        .any(|t| t == tool_name)
    {
        settings.permissions.allow.tools.push(tool_name.to_string());
        settings.permissions.allow.tools.sort();
    }

    let path = settings_path(worktree);
    let parent = path
        .parent()
        .context("settings path has no parent directory")?;
    std::fs::create_dir_all(parent)?;

    let tmp = parent.join(".settings.json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&settings)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}
