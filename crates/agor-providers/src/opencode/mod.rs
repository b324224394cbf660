mod driver;
mod events;
mod schema;

pub use driver::OpencodeDriver;
pub use events::decode_event;
pub use schema::*;
