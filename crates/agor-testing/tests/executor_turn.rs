//! Full executor turns against a scripted claude CLI: prompt → stream →
//! persisted messages → normalized accounting.

use agor_executor::{ExecutorArgs, ExecutorRuntime, TaskOutcome};
use agor_testing::{FakeVendor, TestDaemon, claude_compaction_transcript, claude_text_transcript};
use agor_types::{AgenticTool, PermissionMode, Role, SessionStatus, TaskStatus};

async fn run_turn(
    daemon: &TestDaemon,
    session_id: agor_types::SessionId,
    prompt: &str,
    vendor: &FakeVendor,
) -> TaskOutcome {
    let task = daemon
        .services
        .submit_prompt(agor_daemon::PromptRequest {
            session_id,
            prompt: prompt.into(),
            permission_mode: None,
            created_by: None,
        })
        .await
        .unwrap();

    let args = ExecutorArgs {
        daemon_url: daemon.addr.clone(),
        session_token: daemon.token.clone(),
        session_id,
        task_id: task.task_id,
        tool: AgenticTool::ClaudeCode,
        prompt: prompt.into(),
        permission_mode: Some(PermissionMode::Bypass),
        cwd: None,
        env: [("PATH".to_string(), vendor.path_env())].into_iter().collect(),
    };
    let runtime = ExecutorRuntime::connect(args).await.unwrap();
    runtime.run().await
}

#[tokio::test]
async fn fresh_claude_session_turn() {
    let daemon = TestDaemon::start().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();
    let vendor =
        FakeVendor::install("claude", &claude_text_transcript("sdk-abc", "Hi there!")).unwrap();

    let outcome = run_turn(&daemon, session.session_id, "hello", &vendor).await;
    assert_eq!(outcome, TaskOutcome::Completed);

    // One user message at index 0, assistant reply after it
    let messages = daemon
        .services
        .list_messages(session.session_id)
        .await
        .unwrap();
    assert_eq!(messages[0].index, 0);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content_preview, "hello");
    let assistant = messages
        .iter()
        .find(|m| m.role == Role::Assistant)
        .expect("assistant message persisted");
    assert!(assistant.index >= 1);
    assert_eq!(assistant.content_preview, "Hi there!");

    // Task: completed, normalized, window accounted
    let tasks = daemon
        .services
        .list_tasks(session.session_id, 10)
        .await
        .unwrap();
    let task = &tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);
    let normalized = task.normalized_sdk_response.as_ref().unwrap();
    assert_eq!(normalized.context_window_limit, 200_000);
    assert_eq!(normalized.token_usage.total_tokens, 18);
    assert_eq!(task.computed_context_window, Some(18));

    // Session: idle again, vendor continuation token captured
    let session = daemon.services.get_session(session.session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Idle);
    assert!(session.ready_for_prompt);
    assert_eq!(session.sdk_session_id.as_deref(), Some("sdk-abc"));
}

#[tokio::test]
async fn compaction_event_persists_and_resets_accounting() {
    let daemon = TestDaemon::start().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();

    // T1: plain turn, 100/50 tokens
    let vendor = FakeVendor::install("claude", &{
        let mut t = agor_testing::claude_text_transcript("sdk-1", "first");
        *t.last_mut().unwrap() = agor_testing::claude_result("sdk-1", 100, 50);
        t
    })
    .unwrap();
    let outcome = run_turn(&daemon, session.session_id, "one", &vendor).await;
    assert_eq!(outcome, TaskOutcome::Completed);

    // T2: the vendor compacts; the turn itself is free
    vendor
        .add("claude", &claude_compaction_transcript("sdk-1", 0, 0))
        .unwrap();
    let outcome = run_turn(&daemon, session.session_id, "two", &vendor).await;
    assert_eq!(outcome, TaskOutcome::Completed);

    // The compaction marker is persisted as a system message
    let messages = daemon
        .services
        .list_messages(session.session_id)
        .await
        .unwrap();
    assert!(
        messages.iter().any(|m| m.has_compaction_marker()),
        "compaction boundary must persist"
    );

    // T3: 200/80 tokens. The window resets at the compaction boundary:
    // 280, not the naive 100+50+200+80 = 430.
    vendor
        .add("claude", &{
            let mut t = agor_testing::claude_text_transcript("sdk-1", "third");
            *t.last_mut().unwrap() = agor_testing::claude_result("sdk-1", 200, 80);
            t
        })
        .unwrap();
    let outcome = run_turn(&daemon, session.session_id, "three", &vendor).await;
    assert_eq!(outcome, TaskOutcome::Completed);

    let tasks = daemon
        .services
        .list_completed_tasks(session.session_id, 10)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].computed_context_window, Some(150));
    assert_eq!(tasks[2].computed_context_window, Some(280));
}

#[tokio::test]
async fn vendor_failure_fails_the_task() {
    let daemon = TestDaemon::start().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();

    // A vendor that dies immediately with no output
    let vendor = FakeVendor::install("claude", &[]).unwrap();
    let script = "#!/bin/sh\necho 'model quota exhausted' >&2\nexit 1\n";
    std::fs::write(vendor.bin_dir().join("claude"), script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            vendor.bin_dir().join("claude"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    let outcome = run_turn(&daemon, session.session_id, "boom", &vendor).await;
    match outcome {
        TaskOutcome::Failed(reason) => {
            assert!(reason.contains("quota"), "stderr buffer carried: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let tasks = daemon
        .services
        .list_tasks(session.session_id, 10)
        .await
        .unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert!(tasks[0].failure_reason.as_deref().unwrap_or("").contains("quota"));
}
