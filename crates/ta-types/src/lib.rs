pub mod events;
pub mod models;

pub use events::{StoreEvent, Table};
pub use models::{Group, Message, MessageType, NewMessage, Settings, User};
