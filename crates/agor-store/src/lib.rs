// SQLite store for the daemon.
// Entities are persisted as JSON payloads next to the columns the queries
// filter on; the daemon's service layer is the only writer.

mod db;
mod error;
mod queries;

pub use db::Database;
pub use error::{Error, Result};
pub use queries::SessionFilter;
