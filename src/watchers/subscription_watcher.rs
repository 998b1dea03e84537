use crate::subscribers::{Registration, SubscriberStore};
use crate::telegram::api::Message;
use crate::telegram::{Messenger, TelegramClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const POOL_PAGE_URL: &str = "https://p2pool.io/mini/#pool";
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reply sent after a successful registration
pub fn subscribed_reply() -> String {
    format!(
        "You are subscribed! The bot will now message you about every block found by the pool {POOL_PAGE_URL}"
    )
}

pub const ALREADY_SUBSCRIBED_REPLY: &str =
    "You are already subscribed. Block notifications will keep coming.";

pub const SUBSCRIBE_FAILED_REPLY: &str =
    "Something went wrong while subscribing you to notifications, please try again later.";

/// Turns every incoming chat message into a subscription request.
pub struct SubscriptionWatcher {
    client: Arc<TelegramClient>,
    store: Arc<SubscriberStore>,
    poll_timeout: Duration,
}

impl SubscriptionWatcher {
    pub fn new(
        client: Arc<TelegramClient>,
        store: Arc<SubscriberStore>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            poll_timeout,
        }
    }

    /// Long-poll for updates until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Subscription watcher started");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.client.get_updates(offset, self.poll_timeout) => res,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            handle_message(&self.store, self.client.as_ref(), &message).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch updates: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::info!("Subscription watcher stopped");
    }
}

/// Register the sender's chat and tell them how it went.
///
/// Returns `None` when the store failed; the sender still gets a failure reply.
pub async fn handle_message(
    store: &SubscriberStore,
    messenger: &dyn Messenger,
    message: &Message,
) -> Option<Registration> {
    let sender = message
        .from
        .as_ref()
        .map(|u| u.username.clone().unwrap_or_else(|| u.first_name.clone()))
        .unwrap_or_default();
    tracing::info!(
        "[{sender}] {}",
        message.text.as_deref().unwrap_or_default()
    );

    let chat_id = message.chat.id;
    let (registration, reply) = match store.append(chat_id).await {
        Ok(Registration::Added) => {
            tracing::info!("Chat {chat_id} subscribed");
            (Some(Registration::Added), subscribed_reply())
        }
        Ok(Registration::AlreadySubscribed) => (
            Some(Registration::AlreadySubscribed),
            ALREADY_SUBSCRIBED_REPLY.to_string(),
        ),
        Err(e) => {
            tracing::error!("Failed to save subscriber {chat_id}: {e}");
            (None, SUBSCRIBE_FAILED_REPLY.to_string())
        }
    };

    if let Err(e) = messenger
        .send_message(chat_id, &reply, Some(message.message_id))
        .await
    {
        tracing::warn!("Failed to reply to chat {chat_id}: {e}");
    }

    registration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::api::{Chat, User};
    use crate::telegram::messenger::testing::RecordingMessenger;
    use tempfile::TempDir;

    fn message(chat_id: i64, message_id: i64) -> Message {
        Message {
            message_id,
            from: Some(User {
                id: chat_id,
                is_bot: false,
                first_name: "Ann".into(),
                username: Some("ann".into()),
            }),
            chat: Chat { id: chat_id },
            text: Some("/start".into()),
        }
    }

    #[tokio::test]
    async fn new_sender_is_registered_and_confirmed() {
        let dir = TempDir::new().unwrap();
        let store = SubscriberStore::open(dir.path().join("subs.txt")).await.unwrap();
        let messenger = RecordingMessenger::default();

        let result = handle_message(&store, &messenger, &message(42, 9)).await;

        assert_eq!(result, Some(Registration::Added));
        assert_eq!(store.list_all().await.unwrap(), vec![42]);
        let attempts = messenger.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].chat_id, 42);
        assert_eq!(attempts[0].reply_to, Some(9));
        assert_eq!(attempts[0].text, subscribed_reply());
    }

    #[tokio::test]
    async fn repeat_sender_is_not_duplicated() {
        let dir = TempDir::new().unwrap();
        let store = SubscriberStore::open(dir.path().join("subs.txt")).await.unwrap();
        let messenger = RecordingMessenger::default();

        handle_message(&store, &messenger, &message(42, 1)).await;
        let result = handle_message(&store, &messenger, &message(42, 2)).await;

        assert_eq!(result, Some(Registration::AlreadySubscribed));
        assert_eq!(store.list_all().await.unwrap(), vec![42]);
        assert_eq!(messenger.attempts()[1].text, ALREADY_SUBSCRIBED_REPLY);
    }

    #[tokio::test]
    async fn store_failure_sends_failure_reply() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subs.txt");
        let store = SubscriberStore::open(&path).await.unwrap();
        // A directory in place of the file makes every append fail.
        std::fs::create_dir(&path).unwrap();
        let messenger = RecordingMessenger::default();

        let result = handle_message(&store, &messenger, &message(42, 3)).await;

        assert_eq!(result, None);
        let attempts = messenger.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].text, SUBSCRIBE_FAILED_REPLY);
        assert_eq!(attempts[0].reply_to, Some(3));
    }

    #[tokio::test]
    async fn reply_failure_keeps_registration() {
        let dir = TempDir::new().unwrap();
        let store = SubscriberStore::open(dir.path().join("subs.txt")).await.unwrap();
        let messenger = RecordingMessenger::failing_for(&[42]);

        let result = handle_message(&store, &messenger, &message(42, 4)).await;

        assert_eq!(result, Some(Registration::Added));
        assert_eq!(store.list_all().await.unwrap(), vec![42]);
    }
}
