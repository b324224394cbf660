use crate::gemini::schema::{FunctionDeclaration, ToolDeclarations};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Host-side tool execution for the Gemini loop. Gemini does not run tools
/// itself; the driver collects function calls from a finished turn, executes
/// them here, and feeds the responses back as the next turn's input.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn declarations(&self) -> Vec<ToolDeclarations>;
    async fn execute(&self, name: &str, args: &Value) -> Result<Value>;
}

/// The built-in tool set: shell, file read/write, directory listing.
/// Paths resolve against the working directory so relative tool arguments
/// stay inside the worktree.
pub struct BuiltinToolExecutor {
    working_dir: PathBuf,
}

impl BuiltinToolExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.working_dir.join(p)
        }
    }

    async fn run_shell(&self, args: &Value) -> Result<Value> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .context("run_shell_command requires a command")?;
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .output()
            .await?;
        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": output.status.code(),
        }))
    }

    async fn read_file(&self, args: &Value) -> Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .context("read_file requires a path")?;
        let content = tokio::fs::read_to_string(self.resolve(path)).await?;
        Ok(json!({ "content": content }))
    }

    async fn write_file(&self, args: &Value) -> Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .context("write_file requires a path")?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .context("write_file requires content")?;
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(json!({ "written": true }))
    }

    async fn list_directory(&self, args: &Value) -> Result<Value> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(self.resolve(path)).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        entries.sort();
        Ok(json!({ "entries": entries }))
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    fn declarations(&self) -> Vec<ToolDeclarations> {
        let string_param = |name: &str, desc: &str| {
            json!({
                "type": "object",
                "properties": { name: { "type": "string", "description": desc } },
                "required": [name]
            })
        };
        vec![ToolDeclarations {
            function_declarations: vec![
                FunctionDeclaration {
                    name: "run_shell_command".into(),
                    description: "Run a shell command in the worktree".into(),
                    parameters: Some(string_param("command", "the command to run")),
                },
                FunctionDeclaration {
                    name: "read_file".into(),
                    description: "Read a file relative to the worktree".into(),
                    parameters: Some(string_param("path", "file path")),
                },
                FunctionDeclaration {
                    name: "write_file".into(),
                    description: "Write a file relative to the worktree".into(),
                    parameters: Some(json!({
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["path", "content"]
                    })),
                },
                FunctionDeclaration {
                    name: "list_directory".into(),
                    description: "List a directory relative to the worktree".into(),
                    parameters: Some(string_param("path", "directory path")),
                },
            ],
        }]
    }

    async fn execute(&self, name: &str, args: &Value) -> Result<Value> {
        match name {
            "run_shell_command" => self.run_shell(args).await,
            "read_file" => self.read_file(args).await,
            "write_file" => self.write_file(args).await,
            "list_directory" => self.list_directory(args).await,
            other => anyhow::bail!("unknown tool: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let executor = BuiltinToolExecutor::new(dir.path());

        executor
            .execute(
                "write_file",
                &json!({"path": "notes.txt", "content": "hello"}),
            )
            .await
            .unwrap();
        let read = executor
            .execute("read_file", &json!({"path": "notes.txt"}))
            .await
            .unwrap();
        assert_eq!(read["content"], "hello");
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let executor = BuiltinToolExecutor::new(dir.path());
        assert!(executor.execute("teleport", &json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_list_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let executor = BuiltinToolExecutor::new(dir.path());
        let listing = executor
            .execute("list_directory", &json!({"path": "."}))
            .await
            .unwrap();
        assert_eq!(listing["entries"], json!(["a.txt", "b.txt"]));
    }
}
