pub mod notifier;

pub use notifier::{format_block_message, FanoutReport, Notifier};
