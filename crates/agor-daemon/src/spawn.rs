use crate::config::DaemonConfig;
use crate::error::Result;
use agor_types::{PermissionMode, Session, SessionId, Task, TaskId};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-task executor tokens. Minted at spawn, checked at connection auth,
/// dropped when the executor disconnects or the daemon restarts.
#[derive(Clone, Default)]
pub struct SessionTokens {
    inner: Arc<Mutex<HashMap<String, (SessionId, TaskId)>>>,
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, session_id: SessionId, task_id: TaskId) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.inner
            .lock()
            .expect("token registry poisoned")
            .insert(token.clone(), (session_id, task_id));
        token
    }

    pub fn verify(&self, token: &str) -> Option<(SessionId, TaskId)> {
        self.inner
            .lock()
            .expect("token registry poisoned")
            .get(token)
            .copied()
    }

    pub fn revoke(&self, token: &str) {
        self.inner
            .lock()
            .expect("token registry poisoned")
            .remove(token);
    }
}

/// Environment variables forwarded from the daemon to executors verbatim
/// (before user-config overrides are applied)
const FORWARDED_ENV: &[&str] = &["ANTHROPIC_API_KEY", "GEMINI_API_KEY", "HOME"];

/// Spawns one executor process per prompt, per the executor contract:
/// `(session_token, session_id, task_id, prompt, tool, permission_mode?,
/// daemon_url, cwd?)`, exit 0 on success/stopped and 1 on failure.
pub struct ExecutorSpawner {
    config: Arc<DaemonConfig>,
    tokens: SessionTokens,
}

impl ExecutorSpawner {
    pub fn new(config: Arc<DaemonConfig>, tokens: SessionTokens) -> Self {
        Self { config, tokens }
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    pub async fn spawn(
        &self,
        session: &Session,
        task: &Task,
        prompt: &str,
        permission_mode: Option<PermissionMode>,
    ) -> Result<()> {
        let token = self.tokens.mint(session.session_id, task.task_id);

        let mut cmd = Command::new(&self.config.executor_bin);
        cmd.arg("--daemon-url")
            .arg(&self.config.listen_addr)
            .arg("--session-token")
            .arg(&token)
            .arg("--session-id")
            .arg(session.session_id.to_string())
            .arg("--task-id")
            .arg(task.task_id.to_string())
            .arg("--tool")
            .arg(session.agentic_tool.as_str())
            .arg("--prompt")
            .arg(prompt);
        if let Some(mode) = permission_mode {
            cmd.arg("--permission-mode").arg(mode.as_str());
        }

        cmd.env_clear();
        for key in FORWARDED_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        // User-config environment wins over system env
        cmd.envs(&self.config.user_env);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let task_id = task.task_id;
        let session_id = session.session_id;

        // Reap in the background; the executor reports its own outcome
        // through the service layer, the exit code is telemetry only.
        tokio::spawn(async move {
            if let Some(stderr) = child.stderr.take() {
                use tokio::io::AsyncBufReadExt;
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "executor_stderr", task = %task_id, "{}", line);
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(session = %session_id, task = %task_id, "executor exited cleanly");
                }
                Ok(status) => {
                    warn!(session = %session_id, task = %task_id, code = ?status.code(), "executor exited with failure");
                }
                Err(e) => {
                    warn!(session = %session_id, task = %task_id, error = %e, "executor reap failed");
                }
            }
        });

        Ok(())
    }
}
