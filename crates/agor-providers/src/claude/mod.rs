mod driver;
mod events;
pub mod models;
mod normalize;
mod schema;

pub use driver::ClaudeDriver;
pub use events::decode_event;
pub use normalize::ClaudeNormalizer;
pub use schema::*;
