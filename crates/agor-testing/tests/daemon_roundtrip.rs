//! Wire-level round trips: client → daemon → store → bus → client.

use agor_testing::TestDaemon;
use agor_types::{
    AgenticTool, ContentBlock, Role, SessionPatch, SessionStatus, channels, message_channel,
    session_channel,
};
use serde_json::json;

#[tokio::test]
async fn session_crud_over_the_wire() {
    let daemon = TestDaemon::start().await.unwrap();
    let client = daemon.client().await.unwrap();

    let created = client
        .request(
            "sessions.create",
            json!({ "agentic_tool": "claude-code", "created_by": "wire-test" }),
        )
        .await
        .unwrap();
    let session_id = created["session_id"].as_str().unwrap().parse().unwrap();

    let session = client.get_session(session_id).await.unwrap();
    assert_eq!(session.agentic_tool, AgenticTool::ClaudeCode);
    assert_eq!(session.status, SessionStatus::Idle);

    let patched = client
        .patch_session(session_id, SessionPatch {
            status: Some(SessionStatus::Running),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(patched.status, SessionStatus::Running);
}

#[tokio::test]
async fn bad_token_is_rejected() {
    let daemon = TestDaemon::start().await.unwrap();
    let err = agor_sdk::Client::connect(&daemon.addr, "wrong-token")
        .await
        .err()
        .expect("connect must fail");
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let daemon = TestDaemon::start().await.unwrap();
    let client = daemon.client().await.unwrap();
    let err = client
        .get_session(agor_types::SessionId::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn message_indices_are_gap_free_over_the_wire() {
    let daemon = TestDaemon::start().await.unwrap();
    let client = daemon.client().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();

    for i in 0..5u64 {
        let message = client
            .create_message(
                session.session_id,
                None,
                Role::User,
                vec![ContentBlock::text(format!("m{i}"))],
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(message.index, i);
    }

    let messages = client.messages(session.session_id).await.unwrap();
    for pair in messages.windows(2) {
        assert_eq!(pair[1].index, pair[0].index + 1, "indices must be gap-free");
    }
}

#[tokio::test]
async fn subscription_delivers_fifo_with_seq() {
    let daemon = TestDaemon::start().await.unwrap();
    let client = daemon.client().await.unwrap();
    let session = daemon.create_session(AgenticTool::Codex).await.unwrap();

    let mut sub = client
        .subscribe(&message_channel(session.session_id))
        .await
        .unwrap();

    for i in 0..3 {
        client
            .create_message(
                session.session_id,
                None,
                Role::User,
                vec![ContentBlock::text(format!("m{i}"))],
                None,
                None,
            )
            .await
            .unwrap();
    }

    let mut last_seq = None;
    for _ in 0..3 {
        let (event, _payload, seq) = sub.recv().await.unwrap();
        assert_eq!(event, channels::events::MESSAGE_CREATE);
        if let Some(last) = last_seq {
            assert!(seq > last, "per-channel seq must increase");
        }
        last_seq = Some(seq);
    }
}

#[tokio::test]
async fn prompt_creates_user_message_and_rejects_concurrent() {
    let daemon = TestDaemon::start().await.unwrap();
    let client = daemon.client().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();

    let mut sub = client
        .subscribe(&session_channel(session.session_id))
        .await
        .unwrap();

    let task = client.prompt(session.session_id, "hello", None).await.unwrap();
    assert_eq!(task.status, agor_types::TaskStatus::Queued);

    let messages = client.messages(session.session_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].index, 0);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content_preview, "hello");

    // The session patch lands on the session channel
    let (event, payload, _) = sub.recv().await.unwrap();
    assert_eq!(event, channels::events::SESSION_PATCH);
    assert_eq!(payload["status"], "running");

    // Emulate the executor taking the task, then a second prompt conflicts
    client
        .patch_task(task.task_id, agor_types::TaskPatch {
            status: Some(agor_types::TaskStatus::Running),
            ..Default::default()
        })
        .await
        .unwrap();
    let err = client
        .prompt(session.session_id, "again", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(agor_types::ErrorKind::Conflict));
}
