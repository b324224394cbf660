// Executor worker: one process per prompt. Dial the daemon, subscribe,
// drive the vendor SDK, forward every write through the service layer,
// patch the task with the outcome, exit.

mod permission;
mod runtime;
mod settings;

pub use permission::ExecutorGate;
pub use runtime::{ExecutorArgs, ExecutorRuntime, TaskOutcome};
pub use settings::{load_project_permissions, remember_project_tool};
