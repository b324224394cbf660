use crate::args::{Cli, Command, SessionCommand, WorktreeCommand};
use crate::error::{CliError, Result};
use agor_daemon::{
    DaemonConfig, EventBus, ExecutorSpawner, Server, Services, SessionTokens,
};
use agor_sdk::Client;
use agor_store::Database;
use agor_types::{
    AgenticTool, PermissionDecision, PermissionMode, PermissionScope, RequestId, SessionId,
    TaskId, TaskStatus, WorktreeId, channels, session_channel, message_channel,
};
use std::str::FromStr;
use std::sync::Arc;

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    T::from_str(raw).map_err(|_| CliError::BadArgument(format!("bad {what}: {raw}")))
}

fn parse_tool(raw: &str) -> Result<AgenticTool> {
    AgenticTool::parse(raw).ok_or_else(|| CliError::BadArgument(format!("unknown tool: {raw}")))
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Daemon { config } => run_daemon(config).await,
        Command::Session(command) => session_command(&cli.daemon_url, &cli.token, command).await,
        Command::Prompt {
            session_id,
            prompt,
            permission_mode,
        } => {
            let session_id: SessionId = parse_id(&session_id, "session id")?;
            let mode = match permission_mode.as_deref() {
                Some(raw) => Some(
                    PermissionMode::parse(raw)
                        .ok_or_else(|| CliError::BadArgument(format!("unknown mode: {raw}")))?,
                ),
                None => None,
            };
            run_prompt(&cli.daemon_url, &cli.token, session_id, &prompt, mode).await
        }
        Command::Stop {
            session_id,
            task_id,
        } => {
            let session_id: SessionId = parse_id(&session_id, "session id")?;
            let task_id: TaskId = parse_id(&task_id, "task id")?;
            let client = Client::connect(&cli.daemon_url, &cli.token).await?;
            client.stop_task(session_id, task_id, 1).await?;
            println!("stop signalled for task {task_id}");
            Ok(())
        }
        Command::Permission {
            request_id,
            allow,
            scope,
        } => {
            let request_id: RequestId = parse_id(&request_id, "request id")?;
            let scope = match scope.as_str() {
                "once" => PermissionScope::Once,
                "session" => PermissionScope::Session,
                "project" => PermissionScope::Project,
                other => {
                    return Err(CliError::BadArgument(format!("unknown scope: {other}")));
                }
            };
            let client = Client::connect(&cli.daemon_url, &cli.token).await?;
            client
                .resolve_permission(&PermissionDecision {
                    request_id,
                    allow,
                    scope: Some(scope),
                    decided_by: Some("cli".into()),
                    reason: None,
                })
                .await?;
            println!("{}", if allow { "allowed" } else { "denied" });
            Ok(())
        }
        Command::Worktree(command) => worktree_command(&cli.daemon_url, &cli.token, command).await,
    }
}

async fn run_daemon(config_path: Option<std::path::PathBuf>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Arc::new(match config_path {
        Some(path) => DaemonConfig::load(&path)?,
        None => DaemonConfig::default(),
    });

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(tokio::sync::Mutex::new(
        Database::open(&config.db_path).map_err(agor_daemon::Error::from)?,
    ));

    let bus = EventBus::new();
    let tokens = SessionTokens::new();
    let spawner = Arc::new(ExecutorSpawner::new(config.clone(), tokens.clone()));
    let services = Services::new(store, bus, config.clone()).with_spawner(spawner);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    Server::new(services, tokens).run(listener).await?;
    Ok(())
}

async fn session_command(daemon_url: &str, token: &str, command: SessionCommand) -> Result<()> {
    let client = Client::connect(daemon_url, token).await?;
    match command {
        SessionCommand::Create {
            tool,
            worktree_id,
            created_by,
        } => {
            let tool = parse_tool(&tool)?;
            let worktree_id = worktree_id
                .map(|raw| parse_id::<WorktreeId>(&raw, "worktree id"))
                .transpose()?;
            let session = client
                .request(
                    "sessions.create",
                    serde_json::json!({
                        "agentic_tool": tool,
                        "worktree_id": worktree_id,
                        "created_by": created_by,
                    }),
                )
                .await?;
            println!("{}", session["session_id"].as_str().unwrap_or_default());
            Ok(())
        }
        SessionCommand::List { tool, limit } => {
            let tool = tool.map(|raw| parse_tool(&raw)).transpose()?;
            let sessions = client
                .request(
                    "sessions.find",
                    serde_json::json!({ "tool": tool, "limit": limit }),
                )
                .await?;
            for session in sessions.as_array().into_iter().flatten() {
                println!(
                    "{}  {}  {}  {}",
                    session["session_id"].as_str().unwrap_or_default(),
                    session["agentic_tool"].as_str().unwrap_or_default(),
                    session["status"].as_str().unwrap_or_default(),
                    session["created_at"].as_str().unwrap_or_default(),
                );
            }
            Ok(())
        }
        SessionCommand::Remove { session_id } => {
            let session_id: SessionId = parse_id(&session_id, "session id")?;
            client
                .request(
                    "sessions.remove",
                    serde_json::json!({ "session_id": session_id }),
                )
                .await?;
            println!("removed {session_id}");
            Ok(())
        }
    }
}

/// Submit a prompt and tail the session until the task reaches a terminal
/// state. Streaming chunks print as they arrive.
async fn run_prompt(
    daemon_url: &str,
    token: &str,
    session_id: SessionId,
    prompt: &str,
    mode: Option<PermissionMode>,
) -> Result<()> {
    let client = Client::connect(daemon_url, token).await?;

    let mut session_events = client.subscribe(&session_channel(session_id)).await?;
    let mut stream_events = client.subscribe(&message_channel(session_id)).await?;

    let task = client.prompt(session_id, prompt, mode).await?;
    let task_id = task.task_id;
    eprintln!("task {task_id} queued");

    let printer = tokio::spawn(async move {
        while let Some((event, payload, _seq)) = stream_events.recv().await {
            match event.as_str() {
                channels::events::STREAMING_CHUNK => {
                    if let Some(chunk) = payload.get("chunk").and_then(|v| v.as_str()) {
                        print!("{chunk}");
                    }
                }
                channels::events::STREAMING_END => println!(),
                _ => {}
            }
        }
    });

    while let Some((event, payload, _seq)) = session_events.recv().await {
        match event.as_str() {
            channels::events::TASK_PATCH => {
                let matches = payload
                    .get("task_id")
                    .and_then(|v| v.as_str())
                    .map(|id| id == task_id.to_string())
                    .unwrap_or(false);
                let status: Option<TaskStatus> = payload
                    .get("status")
                    .and_then(|v| serde_json::from_value(v.clone()).ok());
                if matches && status.map(|s| s.is_terminal()).unwrap_or(false) {
                    eprintln!("task {task_id} {}", payload["status"].as_str().unwrap_or("?"));
                    break;
                }
            }
            channels::events::PERMISSION_REQUEST => {
                eprintln!(
                    "permission requested for {} (request {}) — reply with `agor permission`",
                    payload["tool_name"].as_str().unwrap_or("?"),
                    payload["request_id"].as_str().unwrap_or("?"),
                );
            }
            _ => {}
        }
    }

    printer.abort();
    Ok(())
}

async fn worktree_command(daemon_url: &str, token: &str, command: WorktreeCommand) -> Result<()> {
    let client = Client::connect(daemon_url, token).await?;
    match command {
        WorktreeCommand::Create {
            repo,
            path,
            branch,
            created_by,
        } => {
            let worktree = client
                .request(
                    "worktrees.create",
                    serde_json::json!({
                        "repo_id": repo,
                        "path": path,
                        "branch": branch,
                        "created_by": created_by,
                    }),
                )
                .await?;
            println!("{}", worktree["worktree_id"].as_str().unwrap_or_default());
            Ok(())
        }
        WorktreeCommand::Archive { worktree_id } => {
            let worktree_id: WorktreeId = parse_id(&worktree_id, "worktree id")?;
            client
                .request(
                    "worktrees.archive",
                    serde_json::json!({ "worktree_id": worktree_id }),
                )
                .await?;
            println!("archived {worktree_id}");
            Ok(())
        }
        WorktreeCommand::Unarchive { worktree_id } => {
            let worktree_id: WorktreeId = parse_id(&worktree_id, "worktree id")?;
            client
                .request(
                    "worktrees.unarchive",
                    serde_json::json!({ "worktree_id": worktree_id }),
                )
                .await?;
            println!("unarchived {worktree_id}");
            Ok(())
        }
    }
}
