mod driver;
mod events;
pub mod models;
mod normalize;
mod schema;

pub use driver::CodexDriver;
pub use events::CodexEventDecoder;
pub use normalize::CodexNormalizer;
pub use schema::*;
