use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::TelegramSection;

use super::{
    ChatRef, ChatTransport, MemberStatus, MessageRef, OutgoingMessage, TransportError,
    TransportResult, Update,
};

/// Extra time granted to the HTTP request on top of the server-side long poll.
const LONG_POLL_HEADROOM: Duration = Duration::from_secs(15);
const ALLOWED_UPDATES: &[&str] = &["message", "channel_post"];

/// `ChatTransport` speaking the Telegram Bot HTTP API.
pub struct TelegramTransport {
    client: reqwest::Client,
    base: String,
    request_timeout: Duration,
}

impl TelegramTransport {
    pub fn new(section: &TelegramSection) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!(
                "{}/bot{}",
                section.api_base.trim_end_matches('/'),
                section.bot_token
            ),
            request_timeout: section.request_timeout(),
        }
    }

    async fn call<P, T>(&self, method: &'static str, params: &P, timeout: Duration) -> TransportResult<T>
    where
        P: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "telegram request");
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?;
        let envelope: Envelope<T> = response.json().await?;
        match envelope {
            Envelope {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            Envelope {
                ok: true,
                result: None,
                ..
            } => Err(TransportError::Decode(format!("{method} returned no result"))),
            Envelope {
                error_code,
                description,
                ..
            } => Err(TransportError::Api {
                method,
                code: error_code,
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    async fn send_message(
        &self,
        chat_id: &ChatRef,
        reply_to: Option<i64>,
        message: &OutgoingMessage,
    ) -> TransportResult<MessageRef> {
        let params = SendMessage {
            chat_id,
            text: &message.text,
            reply_to_message_id: reply_to,
            reply_markup: Keyboard::from_message(message),
            disable_web_page_preview: true,
        };
        let sent: SentMessage = self
            .call("sendMessage", &params, self.request_timeout)
            .await?;
        Ok(MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct DeleteWebhook {
    drop_pending_updates: bool,
}

#[derive(Serialize)]
struct GetChatMember<'a> {
    chat_id: &'a ChatRef,
    user_id: i64,
}

#[derive(Deserialize)]
struct ChatMember {
    status: MemberStatus,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ChatRef,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Keyboard<'a>>,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Keyboard<'a>>,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: SentChat,
}

#[derive(Deserialize)]
struct SentChat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct Keyboard<'a> {
    inline_keyboard: Vec<Vec<Button<'a>>>,
}

#[derive(Debug, Serialize)]
struct Button<'a> {
    text: &'a str,
    url: &'a str,
}

impl<'a> Keyboard<'a> {
    /// One button per row, in action order.
    fn from_message(message: &'a OutgoingMessage) -> Option<Self> {
        if message.actions.is_empty() {
            return None;
        }
        let inline_keyboard = message
            .actions
            .iter()
            .map(|action| {
                vec![Button {
                    text: &action.label,
                    url: &action.url,
                }]
            })
            .collect();
        Some(Self { inline_keyboard })
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn clear_webhook(&self) -> TransportResult<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &DeleteWebhook {
                    drop_pending_updates: false,
                },
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    async fn receive(&self, offset: i64, timeout: Duration) -> TransportResult<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call("getUpdates", &params, timeout + LONG_POLL_HEADROOM)
            .await
    }

    async fn send(&self, chat: &ChatRef, message: &OutgoingMessage) -> TransportResult<MessageRef> {
        self.send_message(chat, None, message).await
    }

    async fn reply(
        &self,
        to: &MessageRef,
        message: &OutgoingMessage,
    ) -> TransportResult<MessageRef> {
        self.send_message(&ChatRef::Id(to.chat_id), Some(to.message_id), message)
            .await
    }

    async fn edit(&self, target: &MessageRef, message: &OutgoingMessage) -> TransportResult<()> {
        let params = EditMessageText {
            chat_id: target.chat_id,
            message_id: target.message_id,
            text: &message.text,
            reply_markup: Keyboard::from_message(message),
            disable_web_page_preview: true,
        };
        // result is the edited message, or `true` for inline messages
        let _: Value = self
            .call("editMessageText", &params, self.request_timeout)
            .await?;
        Ok(())
    }

    async fn member_status(&self, chat: &ChatRef, user_id: i64) -> TransportResult<MemberStatus> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                &GetChatMember {
                    chat_id: chat,
                    user_id,
                },
                self.request_timeout,
            )
            .await?;
        Ok(member.status)
    }
}
