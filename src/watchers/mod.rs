pub mod block_watcher;
pub mod subscription_watcher;

pub use block_watcher::{BlockWatcher, TickOutcome, WatcherState};
pub use subscription_watcher::SubscriptionWatcher;
