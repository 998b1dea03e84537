use super::messenger::Messenger;
use crate::error::DeliveryError;
use crate::subscribers::ChatId;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

// Extra time on top of the long-poll timeout before giving up on getUpdates.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// REST client for the Telegram Bot API
pub struct TelegramClient {
    base_url: String,
    token: String,
    http: Client,
}

/// Bot API envelope: `{"ok": true, "result": ...}` or `{"ok": false, "description": ...}`
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

impl TelegramClient {
    pub fn new(token: String, timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_base_url(DEFAULT_API_BASE.to_string(), token, timeout)
    }

    pub fn with_base_url(
        base_url: String,
        token: String,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        // The request URL embeds the bot token; keep it out of error messages.
        let resp = req.send().await.map_err(|e| {
            DeliveryError::Transport(format!(
                "Telegram {method} request failed: {}",
                e.without_url()
            ))
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            DeliveryError::Transport(format!(
                "Failed to read {method} response: {}",
                e.without_url()
            ))
        })?;

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                DeliveryError::Transport(format!("Failed to parse {method} response: {e}"))
            } else {
                DeliveryError::Rejected {
                    status: i64::from(status.as_u16()),
                    description: body.chars().take(200).collect(),
                }
            }
        })?;

        if !envelope.ok {
            return Err(DeliveryError::Rejected {
                status: envelope
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope.result.ok_or_else(|| {
            DeliveryError::Transport(format!("Telegram {method} returned no result"))
        })
    }

    /// Identify the bot behind the token.
    pub async fn get_me(&self) -> Result<User, DeliveryError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates with id >= `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, DeliveryError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &request, Some(timeout + LONG_POLL_MARGIN))
            .await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_parameters: reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
        };
        let _sent: Message = self.call("sendMessage", &request, None).await?;
        Ok(())
    }
}
