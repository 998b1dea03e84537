use crate::error::DeliveryError;
use crate::pool::Block;
use crate::subscribers::ChatId;
use crate::telegram::Messenger;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

/// Per-subscriber result of one fanout.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: Vec<ChatId>,
    pub failed: Vec<(ChatId, DeliveryError)>,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<ChatId> {
        self.failed.iter().map(|(id, _)| *id).collect()
    }
}

/// Sends one block notification to every subscriber.
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    concurrency: usize,
}

impl Notifier {
    /// `concurrency` bounds how many deliveries are in flight at once (minimum 1).
    pub fn new(messenger: Arc<dyn Messenger>, concurrency: usize) -> Self {
        Self {
            messenger,
            concurrency: concurrency.max(1),
        }
    }

    /// Attempt delivery to every subscriber. A failed delivery never stops the
    /// remaining ones; failures come back in the report in subscriber order.
    pub async fn notify_all(&self, event: &Block, subscribers: &[ChatId]) -> FanoutReport {
        let text = format_block_message(event);
        let text = text.as_str();
        let messenger = self.messenger.as_ref();

        let outcomes: Vec<(ChatId, Result<(), DeliveryError>)> =
            stream::iter(subscribers.iter().copied())
                .map(|chat_id| async move {
                    (chat_id, messenger.send_message(chat_id, text, None).await)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut report = FanoutReport::default();
        for (chat_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered.push(chat_id),
                Err(e) => {
                    tracing::warn!(
                        "Failed to notify chat {chat_id} about block {}: {e}",
                        event.height
                    );
                    report.failed.push((chat_id, e));
                }
            }
        }

        tracing::info!(
            "Block {} fanout: {} delivered, {} failed",
            event.height,
            report.delivered.len(),
            report.failed.len()
        );
        report
    }
}

/// Text sent to subscribers for a found block. The time is rendered RFC 850 style in UTC.
pub fn format_block_message(block: &Block) -> String {
    format!(
        "Block found! Height: {}, time: {}",
        block.height,
        block.observed_at.format("%A, %d-%b-%y %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::messenger::testing::RecordingMessenger;

    fn block() -> Block {
        Block::from_millis(100, 1_700_000_000_000).unwrap()
    }

    #[test]
    fn message_embeds_height_and_time() {
        assert_eq!(
            format_block_message(&block()),
            "Block found! Height: 100, time: Tuesday, 14-Nov-23 22:13:20 UTC"
        );
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_in_order() {
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Notifier::new(messenger.clone(), 1);

        let report = notifier.notify_all(&block(), &[1, 2, 3]).await;

        assert_eq!(report.delivered, vec![1, 2, 3]);
        assert!(report.failed.is_empty());
        let attempts = messenger.attempts();
        assert_eq!(
            attempts.iter().map(|m| m.chat_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(attempts.iter().all(|m| m.text.contains("Height: 100")));
        assert!(attempts.iter().all(|m| m.reply_to.is_none()));
    }

    #[tokio::test]
    async fn failure_does_not_stop_fanout() {
        let messenger = Arc::new(RecordingMessenger::failing_for(&[2]));
        let notifier = Notifier::new(messenger.clone(), 1);

        let report = notifier.notify_all(&block(), &[1, 2, 3]).await;

        assert_eq!(messenger.attempts().len(), 3);
        assert_eq!(messenger.attempts()[2].chat_id, 3);
        assert_eq!(report.delivered, vec![1, 3]);
        assert_eq!(report.failed_ids(), vec![2]);
        assert!(matches!(
            report.failed[0].1,
            DeliveryError::Rejected { status: 403, .. }
        ));
        assert_eq!(report.attempted(), 3);
    }

    #[tokio::test]
    async fn bounded_concurrency_keeps_contract() {
        let messenger = Arc::new(RecordingMessenger::failing_for(&[2, 4]));
        let notifier = Notifier::new(messenger.clone(), 3);

        let report = notifier.notify_all(&block(), &[1, 2, 3, 4, 5]).await;

        assert_eq!(messenger.attempts().len(), 5);
        assert_eq!(report.delivered, vec![1, 3, 5]);
        assert_eq!(report.failed_ids(), vec![2, 4]);
    }

    #[tokio::test]
    async fn no_subscribers_is_empty_report() {
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Notifier::new(messenger.clone(), 0);

        let report = notifier.notify_all(&block(), &[]).await;

        assert_eq!(report, FanoutReport::default());
        assert!(messenger.attempts().is_empty());
    }
}
