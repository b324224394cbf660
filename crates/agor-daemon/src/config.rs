use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Daemon configuration, loaded from `agor.toml` with per-field defaults.
///
/// `user_env` entries override the system environment when executor
/// subprocesses are spawned (user-config wins over system env).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// TCP address the daemon listens on
    pub listen_addr: String,
    /// SQLite database path; `:memory:` is only used by tests
    pub db_path: PathBuf,
    /// Shared bearer for UI/CLI clients (executor tokens are minted per task)
    pub auth_token: String,
    /// Executor binary; resolved from PATH when relative
    pub executor_bin: PathBuf,
    /// Extra environment for executor subprocesses
    pub user_env: BTreeMap<String, String>,
    /// Default model per tool when the session config leaves it unset
    pub default_models: BTreeMap<String, String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agor");
        Self {
            listen_addr: "127.0.0.1:7733".to_string(),
            db_path: data_dir.join("agor.db"),
            auth_token: "agor-local".to_string(),
            executor_bin: PathBuf::from("agor-executor"),
            user_env: BTreeMap::new(),
            default_models: default_models(),
        }
    }
}

fn default_models() -> BTreeMap<String, String> {
    [
        ("claude-code", "claude-sonnet-4-5"),
        ("codex", "gpt-5-codex"),
        ("gemini", "gemini-2.5-pro"),
        ("opencode", "claude-sonnet-4-5"),
    ]
    .into_iter()
    .map(|(tool, model)| (tool.to_string(), model.to_string()))
    .collect()
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)
            .map_err(|e| crate::error::Error::Validation(format!("bad config: {e}")))?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }

    pub fn default_model_for(&self, tool: agor_types::AgenticTool) -> String {
        self.default_models
            .get(tool.as_str())
            .cloned()
            .unwrap_or_else(|| "claude-sonnet-4-5".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_tools() {
        let config = DaemonConfig::default();
        for tool in ["claude-code", "codex", "gemini", "opencode"] {
            assert!(config.default_models.contains_key(tool), "missing {tool}");
        }
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agor.toml");
        std::fs::write(&path, "listen_addr = \"127.0.0.1:9000\"\n").unwrap();
        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.auth_token, "agor-local");
    }
}
