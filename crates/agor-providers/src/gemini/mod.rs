mod driver;
mod events;
pub mod models;
mod normalize;
mod schema;
mod tools;

pub use driver::{GeminiDriver, context_file_path, remove_context_file};
pub use events::decode_response;
pub use normalize::GeminiNormalizer;
pub use schema::*;
pub use tools::{BuiltinToolExecutor, ToolExecutor};
