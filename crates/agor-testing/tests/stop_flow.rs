//! Stop signalling: task_stop → immediate ack → terminal task state.

use agor_providers::StopHandle;
use agor_testing::TestDaemon;
use agor_types::{
    AgenticTool, Task, TaskPatch, TaskStatus, channels, session_channel,
};

#[tokio::test]
async fn stop_is_acked_then_task_lands_terminal() {
    let daemon = TestDaemon::start().await.unwrap();
    let session = daemon.create_session(AgenticTool::ClaudeCode).await.unwrap();
    let task = Task::new(session.session_id, "test");
    daemon
        .services
        .store()
        .lock()
        .await
        .insert_task(&task)
        .unwrap();

    // Fake executor: subscribe, ack matching task_stop before shutdown,
    // then patch the task stopped — the 4.G contract.
    let executor_client = daemon.client().await.unwrap();
    let stop = StopHandle::new();
    let executor_stop = stop.clone();
    let task_id = task.task_id;
    let session_id = session.session_id;
    let mut executor_sub = executor_client
        .subscribe(&session_channel(session_id))
        .await
        .unwrap();
    let executor = tokio::spawn(async move {
        while let Some((event, payload, _)) = executor_sub.recv().await {
            if event == channels::events::TASK_STOP {
                let matches = payload["task_id"].as_str() == Some(task_id.to_string().as_str());
                if matches {
                    let sequence = payload["sequence"].as_u64().unwrap_or(0);
                    executor_client
                        .ack_stop(session_id, task_id, sequence)
                        .await
                        .unwrap();
                    executor_stop.stop();
                    executor_client
                        .patch_task(task_id, TaskPatch {
                            status: Some(TaskStatus::Stopped),
                            ..Default::default()
                        })
                        .await
                        .unwrap();
                    break;
                }
            }
        }
    });

    // Observer sees: task_stop → task_stop_ack (matching sequence)
    let observer = daemon.client().await.unwrap();
    let mut events = observer.subscribe(&session_channel(session_id)).await.unwrap();

    let ui = daemon.client().await.unwrap();
    ui.stop_task(session_id, task_id, 42).await.unwrap();

    let mut stop_seen = false;
    let mut ack_seen = false;
    for _ in 0..6 {
        let Ok(Some((event, payload, _))) =
            tokio::time::timeout(std::time::Duration::from_secs(2), events.recv()).await
        else {
            break;
        };
        match event.as_str() {
            channels::events::TASK_STOP => {
                assert_eq!(payload["sequence"], 42);
                stop_seen = true;
            }
            channels::events::TASK_STOP_ACK => {
                assert!(stop_seen, "ack must follow the stop on the channel");
                assert_eq!(payload["sequence"], 42, "ack echoes the stop sequence");
                ack_seen = true;
            }
            _ => {}
        }
        if ack_seen {
            break;
        }
    }
    assert!(ack_seen, "executor must ack the stop");

    executor.await.unwrap();
    assert!(stop.is_stopped());

    let final_task = daemon.services.get_task(task_id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Stopped);
    assert!(final_task.completed_at.is_some());
}
