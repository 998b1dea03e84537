use crate::error::DeliveryError;
use crate::subscribers::ChatId;
use async_trait::async_trait;

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` to `chat_id`, optionally as a reply to one of its messages.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), DeliveryError>;
}
