use agor_daemon::{DaemonConfig, EventBus, Server, Services, SessionTokens};
use agor_sdk::Client;
use agor_store::Database;
use agor_types::{AgenticTool, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A real daemon on an ephemeral port with an in-memory store.
///
/// No executor spawner is attached: prompts enqueue tasks and tests drive
/// the executor side themselves (in-process runtime or fake vendor).
pub struct TestDaemon {
    pub services: Services,
    pub addr: String,
    pub token: String,
    _server: tokio::task::JoinHandle<()>,
}

impl TestDaemon {
    pub async fn start() -> anyhow::Result<Self> {
        let config = Arc::new(DaemonConfig::default());
        let store = Arc::new(tokio::sync::Mutex::new(Database::open_in_memory()?));
        let services = Services::new(store, EventBus::new(), config.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let server = Server::new(services.clone(), SessionTokens::new());
        let handle = tokio::spawn(async move {
            let _ = server.run(listener).await;
        });

        Ok(Self {
            services,
            addr,
            token: config.auth_token.clone(),
            _server: handle,
        })
    }

    pub async fn client(&self) -> anyhow::Result<Client> {
        Ok(Client::connect(&self.addr, &self.token).await?)
    }

    pub async fn create_session(&self, tool: AgenticTool) -> anyhow::Result<Session> {
        Ok(self
            .services
            .create_session(agor_daemon::CreateSession {
                agentic_tool: tool,
                worktree_id: None,
                created_by: "test".into(),
                model_config: None,
                permission_config: None,
                genealogy: None,
            })
            .await?)
    }
}

/// A fake vendor CLI: a shell script that prints a scripted JSONL
/// transcript and exits 0. Prepend `bin_dir()` to PATH so the drivers
/// resolve it instead of the real tool.
pub struct FakeVendor {
    dir: TempDir,
}

impl FakeVendor {
    /// Install a fake binary named `name` that emits `lines` on stdout
    pub fn install(name: &str, lines: &[serde_json::Value]) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let vendor = Self { dir };
        vendor.add(name, lines)?;
        Ok(vendor)
    }

    pub fn add(&self, name: &str, lines: &[serde_json::Value]) -> anyhow::Result<()> {
        let mut script = String::from("#!/bin/sh\n");
        for line in lines {
            let json = serde_json::to_string(line)?;
            // Single quotes keep the JSON intact through the shell
            script.push_str(&format!("printf '%s\\n' '{}'\n", json.replace('\'', r"'\''")));
        }
        let path = self.dir.path().join(name);
        std::fs::write(&path, script)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }

    pub fn bin_dir(&self) -> &Path {
        self.dir.path()
    }

    /// PATH value with this vendor's directory prepended
    pub fn path_env(&self) -> String {
        let current = std::env::var("PATH").unwrap_or_default();
        format!("{}:{}", self.bin_dir().display(), current)
    }
}

/// A scratch worktree directory with a `.git` marker so drivers treat it
/// as a real checkout
pub fn scratch_worktree() -> anyhow::Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    std::fs::create_dir(dir.path().join(".git"))?;
    let path = dir.path().to_path_buf();
    Ok((dir, path))
}
