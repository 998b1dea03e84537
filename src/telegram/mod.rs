pub mod api;
pub mod messenger;

pub use api::{TelegramClient, Update};
pub use messenger::Messenger;
