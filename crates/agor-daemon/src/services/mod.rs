mod boards;
mod messages;
mod permissions;
mod prompt;
mod sessions;
mod tasks;
mod worktrees;

use crate::bus::EventBus;
use crate::config::DaemonConfig;
use crate::spawn::ExecutorSpawner;
use agor_store::Database;
use agor_types::{
    AgenticTool, ContentBlock, Genealogy, MessageMetadata, ModelConfig, PermissionConfig, Role,
    SessionId, TaskId, WorktreeId,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedStore = Arc<Mutex<Database>>;

/// The daemon's service layer. Every create/patch/remove validates, writes
/// to the store, emits the post-state on the bus, and returns it — in that
/// order, always. Executors and UI clients go through these methods; the
/// store is never written directly.
#[derive(Clone)]
pub struct Services {
    pub(crate) store: SharedStore,
    pub(crate) bus: EventBus,
    pub(crate) config: Arc<DaemonConfig>,
    pub(crate) spawner: Option<Arc<ExecutorSpawner>>,
}

impl Services {
    pub fn new(store: SharedStore, bus: EventBus, config: Arc<DaemonConfig>) -> Self {
        Self {
            store,
            bus,
            config,
            spawner: None,
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<ExecutorSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub agentic_tool: AgenticTool,
    #[serde(default)]
    pub worktree_id: Option<WorktreeId>,
    pub created_by: String,
    #[serde(default)]
    pub model_config: Option<ModelConfig>,
    #[serde(default)]
    pub permission_config: Option<PermissionConfig>,
    #[serde(default)]
    pub genealogy: Option<Genealogy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub session_id: SessionId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorktree {
    pub repo_id: String,
    pub path: PathBuf,
    pub branch: String,
    #[serde(default)]
    pub board_id: Option<agor_types::BoardId>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub session_id: SessionId,
    pub prompt: String,
    #[serde(default)]
    pub permission_mode: Option<agor_types::PermissionMode>,
    #[serde(default)]
    pub created_by: Option<String>,
}
