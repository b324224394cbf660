use agor_types::{NormalizedSdkData, PermissionVerdict, ProcessedEvent, Task};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};

/// Lookup context handed to normalizers.
///
/// Codex reports cumulative totals, so its normalizer needs the prior
/// completed tasks of the same session to compute a per-turn delta.
pub struct NormalizeContext<'a> {
    pub prior_tasks: &'a [Task],
}

impl NormalizeContext<'_> {
    pub fn empty() -> NormalizeContext<'static> {
        NormalizeContext { prior_tasks: &[] }
    }
}

/// Raw vendor result payload → `NormalizedSdkData`.
///
/// Normalization must be deterministic: the same raw payload and context
/// always produce the same output.
pub trait SdkNormalizer: Send + Sync {
    fn normalize(
        &self,
        raw: &serde_json::Value,
        ctx: &NormalizeContext<'_>,
    ) -> Option<NormalizedSdkData>;
}

/// Tool-gate callback invoked inline by drivers before a tool proceeds
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(
        &self,
        tool_name: &str,
        tool_input: &serde_json::Value,
        tool_use_id: &str,
    ) -> Result<PermissionVerdict>;
}

/// Cooperative stop signal shared between the executor and a driver.
///
/// Drivers check `is_stopped` at event boundaries so a stop lands promptly
/// even while the vendor is mid-stream; `cancelled()` is the awaitable form
/// used inside `select!` arms.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub async fn cancelled(&self) {
        if self.is_stopped() {
            return;
        }
        loop {
            let notified = self.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
            if self.is_stopped() {
                return;
            }
        }
    }
}

/// Per-tool prompt driver: configure a vendor query, iterate its stream,
/// decode into `ProcessedEvent`s and push them to the executor.
///
/// A stop is not an error: drivers send `ProcessedEvent::Stopped` and return
/// `Ok(())`. A terminal vendor failure returns `Err` with the vendor's
/// stderr buffer appended.
#[async_trait]
pub trait PromptDriver: Send + Sync {
    async fn prompt_session_streaming(
        &self,
        ctx: crate::PromptContext,
        gate: Arc<dyn PermissionGate>,
        stop: StopHandle,
        events: mpsc::Sender<ProcessedEvent>,
    ) -> Result<()>;
}

/// Canonical cancellation sentinel. Distinguished from genuine failures at
/// match sites: a cancelled turn patches the task stopped and exits 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl fmt::Display for CancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for CancelledError {}

/// Vendor failures the executor needs to tell apart
#[derive(Debug)]
pub enum VendorError {
    /// Credential missing or rejected; never retried silently
    Unauthenticated(String),
    /// Vendor auth handshake exceeded its deadline (distinct from a
    /// credential failure)
    AuthTimeout(String),
    /// SDK surfaced an error; carries the stderr buffer when available
    Sdk { message: String, stderr: String },
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorError::Unauthenticated(msg) => write!(f, "Vendor authentication failed: {}", msg),
            VendorError::AuthTimeout(msg) => write!(f, "Vendor authentication timed out: {}", msg),
            VendorError::Sdk { message, stderr } => {
                if stderr.is_empty() {
                    write!(f, "Vendor SDK error: {}", message)
                } else {
                    write!(f, "Vendor SDK error: {}\nstderr: {}", message, stderr)
                }
            }
        }
    }
}

impl std::error::Error for VendorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_handle_flag() {
        let stop = StopHandle::new();
        assert!(!stop.is_stopped());
        stop.stop();
        assert!(stop.is_stopped());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_stop() {
        let stop = StopHandle::new();
        let waiter = stop.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        stop.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_immediate_when_already_stopped() {
        let stop = StopHandle::new();
        stop.stop();
        stop.cancelled().await;
    }
}
