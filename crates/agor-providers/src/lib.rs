// Vendor SDK adapters: per-tool event decoding, token normalization and
// prompt drivers. Everything vendor-specific lives behind the traits in
// `traits.rs`; the executor only ever sees `ProcessedEvent`s.

pub mod claude;
pub mod codex;
mod context_window;
pub mod gemini;
mod mcp_format;
pub mod opencode;
mod registry;
mod setup;
mod subprocess;
mod thinking;
mod token_limits;
mod traits;

pub use context_window::{
    TASK_SCAN_WINDOW, compute_context_window, compute_context_window_or_current,
    current_turn_fresh_tokens,
};
pub use mcp_format::to_mcp_servers_config;
pub use subprocess::PermissionDeniedError;
pub use registry::{ToolAdapter, get_all_tools, get_tool_metadata};
pub use setup::{PromptContext, ResumeDecision, is_sdk_session_stale, resolve_resume, resolve_working_dir};
pub use thinking::{ThinkingBudget, resolve_thinking_budget};
pub use token_limits::{ModelSpec, resolve_model_limit};
pub use traits::{
    CancelledError, NormalizeContext, PermissionGate, PromptDriver, SdkNormalizer, StopHandle,
    VendorError,
};
