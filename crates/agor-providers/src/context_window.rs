use crate::registry::ToolAdapter;
use crate::traits::NormalizeContext;
use agor_types::{AgenticTool, Message, Task, TaskId};
use std::collections::HashSet;
use tracing::warn;

/// How many prior tasks the scan will consider, newest included
pub const TASK_SCAN_WINDOW: usize = 100;

/// Fresh tokens the current turn added, derived from the raw vendor result.
///
/// Shares the normalizer code path so the number matches what will be
/// persisted as `normalized_sdk_response` (Claude sums across all models).
pub fn current_turn_fresh_tokens(
    tool: AgenticTool,
    raw: &serde_json::Value,
    ctx: &NormalizeContext<'_>,
) -> u64 {
    ToolAdapter::for_tool(tool)
        .normalizer
        .normalize(raw, ctx)
        .map(|data| data.token_usage.fresh_tokens())
        .unwrap_or(0)
}

/// Cumulative context-window estimate for a session at the current task.
///
/// Sums per-turn fresh tokens (input + output, cache reads excluded) of
/// completed tasks since the most recent compaction boundary, then adds the
/// current turn. Compaction boundaries are system messages carrying a
/// compaction marker; their `task_id`s partition the task timeline.
///
/// `prior_tasks` must be chronologically ascending and already bounded by
/// the caller (`TASK_SCAN_WINDOW`); the current task is excluded because it
/// is not persisted yet.
pub fn compute_context_window(
    messages: &[Message],
    prior_tasks: &[Task],
    current_task_id: TaskId,
    current_turn_tokens: u64,
) -> u64 {
    let compacted_tasks: HashSet<TaskId> = messages
        .iter()
        .filter(|m| m.has_compaction_marker())
        .filter_map(|m| m.task_id)
        .collect();

    // Index of the most recent task that produced a compaction event;
    // everything at or before it no longer occupies the window.
    let last_compaction = prior_tasks
        .iter()
        .rposition(|task| compacted_tasks.contains(&task.task_id));

    let since_compaction = match last_compaction {
        Some(idx) => &prior_tasks[idx + 1..],
        None => prior_tasks,
    };

    let prior_tokens: u64 = since_compaction
        .iter()
        .filter(|task| task.task_id != current_task_id)
        .filter_map(|task| task.normalized_sdk_response.as_ref())
        .map(|data| data.token_usage.fresh_tokens())
        .sum();

    prior_tokens + current_turn_tokens
}

/// Fallible wrapper used by the executor: any lookup failure degrades to
/// the current turn's tokens alone rather than failing the task.
pub fn compute_context_window_or_current(
    lookup: impl FnOnce() -> anyhow::Result<(Vec<Message>, Vec<Task>)>,
    current_task_id: TaskId,
    current_turn_tokens: u64,
) -> u64 {
    match lookup() {
        Ok((messages, prior_tasks)) => compute_context_window(
            &messages,
            &prior_tasks,
            current_task_id,
            current_turn_tokens,
        ),
        Err(e) => {
            warn!(error = %e, "context window lookup failed; using current-task tokens");
            current_turn_tokens
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agor_types::{
        ContentBlock, NormalizedSdkData, Role, SessionId, TaskStatus, TokenUsage,
    };

    fn completed_task(session_id: SessionId, input: u64, output: u64) -> Task {
        let mut task = Task::new(session_id, "tester");
        task.status = TaskStatus::Completed;
        task.normalized_sdk_response = Some(NormalizedSdkData {
            token_usage: TokenUsage::new(input, output),
            context_window_limit: 200_000,
            cost_usd: None,
            primary_model: None,
            duration_ms: None,
        });
        task
    }

    fn compaction_message(session_id: SessionId, index: u64, task_id: TaskId) -> Message {
        Message::new(session_id, index, Role::System, vec![
            ContentBlock::SystemStatus {
                system_type: Some("compaction".into()),
                status: None,
                metadata: None,
            },
        ])
        .with_task(task_id)
    }

    #[test]
    fn test_no_compaction_sums_all_tasks() {
        let session_id = SessionId::new();
        let t1 = completed_task(session_id, 100, 50);
        let t2 = completed_task(session_id, 200, 80);
        let current = TaskId::new();

        let total = compute_context_window(&[], &[t1, t2], current, 30);
        assert_eq!(total, 150 + 280 + 30);
    }

    #[test]
    fn test_compaction_resets_accounting() {
        // T1(100/50), T2 compacts, T3(200/80): window after T3 is 280, not 430
        let session_id = SessionId::new();
        let t1 = completed_task(session_id, 100, 50);
        let t2 = completed_task(session_id, 0, 0);
        let t3 = completed_task(session_id, 200, 80);
        let messages = vec![compaction_message(session_id, 5, t2.task_id)];

        let total =
            compute_context_window(&messages, &[t1, t2, t3.clone()], t3.task_id, 280);
        assert_eq!(total, 280);
    }

    #[test]
    fn test_monotone_across_non_compaction_tasks() {
        let session_id = SessionId::new();
        let t1 = completed_task(session_id, 100, 50);
        let t2 = completed_task(session_id, 40, 10);

        let after_t1 = compute_context_window(&[], &[t1.clone()], t2.task_id, 50);
        let t3 = TaskId::new();
        let after_t2 = compute_context_window(&[], &[t1, t2], t3, 50);
        assert!(after_t2 >= after_t1);
    }

    #[test]
    fn test_current_task_excluded_from_prior_sum() {
        // The current task may already appear in the prior list if the
        // caller raced its own completion write; it must not double count.
        let session_id = SessionId::new();
        let current = completed_task(session_id, 500, 100);
        let total = compute_context_window(&[], &[current.clone()], current.task_id, 600);
        assert_eq!(total, 600);
    }

    #[test]
    fn test_lookup_failure_degrades_to_current() {
        let total = compute_context_window_or_current(
            || anyhow::bail!("store unreachable"),
            TaskId::new(),
            42,
        );
        assert_eq!(total, 42);
    }

    #[test]
    fn test_tasks_without_normalized_data_are_skipped() {
        let session_id = SessionId::new();
        let mut bare = Task::new(session_id, "tester");
        bare.status = TaskStatus::Completed;
        let t2 = completed_task(session_id, 10, 5);

        let total = compute_context_window(&[], &[bare, t2], TaskId::new(), 7);
        assert_eq!(total, 15 + 7);
    }
}
