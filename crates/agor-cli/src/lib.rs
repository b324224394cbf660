mod args;
mod commands;
mod error;

pub use args::{Cli, Command, SessionCommand, WorktreeCommand};
pub use error::{CliError, Result};

/// Entry point shared by main.rs and the integration tests
pub fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Io)?;
    runtime.block_on(commands::dispatch(cli))
}
