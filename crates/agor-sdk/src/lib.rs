// Client for the daemon's JSON-line protocol. The executor and the CLI
// both speak through this crate; nothing else opens the socket directly.

mod client;
mod error;

pub use client::{Client, Subscription};
pub use error::{Error, Result};
