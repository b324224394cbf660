// The long-lived half of the control plane: owns the store, the real-time
// bus, and executor process lifecycles. Every mutation flows through the
// service layer so the matching bus event always fires.

mod bus;
mod config;
mod error;
mod mcp;
mod server;
mod services;
mod spawn;

pub use bus::{BusEvent, EventBus};
pub use config::DaemonConfig;
pub use error::{Error, Result};
pub use mcp::merge_mcp_servers;
pub use server::Server;
pub use services::{
    CreateMessage, CreateSession, CreateWorktree, PromptRequest, Services, SharedStore,
};
pub use spawn::{ExecutorSpawner, SessionTokens};
