pub mod store;

pub use store::{ChatId, Registration, SubscriberStore};
