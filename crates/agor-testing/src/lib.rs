//! Test harness for the Agor workspace.
//!
//! `TestDaemon` runs a real daemon (store, bus, wire server) on an
//! ephemeral port with an in-memory database; `fixtures` provides
//! scripted vendor transcripts so drivers can be exercised without any
//! real agent CLI installed.

mod fixtures;
mod world;

pub use fixtures::*;
pub use world::{FakeVendor, TestDaemon};
