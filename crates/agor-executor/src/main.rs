use agor_executor::{ExecutorArgs, ExecutorRuntime, TaskOutcome};
use agor_types::{AgenticTool, PermissionMode, SessionId, TaskId};
use clap::Parser;
use tracing::error;

/// One-prompt executor worker. Spawned by the daemon; exits 0 on
/// success/stopped, 1 on failure, 2 on vendor auth failure.
#[derive(Parser, Debug)]
#[command(name = "agor-executor")]
struct Cli {
    #[arg(long)]
    daemon_url: String,
    #[arg(long)]
    session_token: String,
    #[arg(long)]
    session_id: SessionId,
    #[arg(long)]
    task_id: TaskId,
    /// One of: claude-code, codex, gemini, opencode
    #[arg(long)]
    tool: String,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    permission_mode: Option<String>,
    #[arg(long)]
    cwd: Option<std::path::PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(tool) = AgenticTool::parse(&cli.tool) else {
        eprintln!("unknown tool: {}", cli.tool);
        std::process::exit(64);
    };
    let permission_mode = match cli.permission_mode.as_deref() {
        Some(raw) => match PermissionMode::parse(raw) {
            Some(mode) => Some(mode),
            None => {
                eprintln!("unknown permission mode: {raw}");
                std::process::exit(64);
            }
        },
        None => None,
    };

    let args = ExecutorArgs {
        daemon_url: cli.daemon_url,
        session_token: cli.session_token,
        session_id: cli.session_id,
        task_id: cli.task_id,
        tool,
        prompt: cli.prompt,
        permission_mode,
        cwd: cli.cwd,
        env: Default::default(),
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
    let outcome = runtime.block_on(run(args));
    std::process::exit(outcome.exit_code());
}

async fn run(args: ExecutorArgs) -> TaskOutcome {
    let executor = match ExecutorRuntime::connect(args).await {
        Ok(executor) => executor,
        Err(e) => {
            error!(error = %e, "failed to connect to daemon");
            return TaskOutcome::Failed(e.to_string());
        }
    };

    // SIGTERM / SIGINT become a stop: the run loop patches the task to
    // stopped and the process exits 0.
    let stop = executor.stop_handle();
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(signal) => signal,
            Err(_) => return,
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        stop.stop();
    });

    executor.run().await
}
