pub mod chat;
mod observers;

pub use chat::ChatViewModel;
