pub mod chat;
pub mod error;
pub mod observe;
pub mod settings;
pub mod users;

pub use chat::ChatRepository;
pub use error::{Error, Result};
pub use settings::SettingsRepository;
pub use users::UserRepository;
