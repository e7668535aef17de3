//! Minimal Telegram Bot API client: sendMessage and getUpdates long polling.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Messenger;

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// One URL button per row.
    pub fn from_url_buttons(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
}

pub struct BotApi {
    client: Client,
    base: String,
}

impl BotApi {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("tracklink-bot/0.1.0")
            .build()
            .context("failed to build HTTP client for the bot API")?;

        Ok(Self {
            client,
            base: format!("https://api.telegram.org/bot{token}"),
        })
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("bot API request '{method}' failed"))?;

        let payload: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("bot API response for '{method}' was not valid JSON"))?;

        if !payload.ok {
            bail!(
                "bot API '{method}' returned an error: {}",
                payload.description.as_deref().unwrap_or("no description")
            );
        }

        payload
            .result
            .ok_or_else(|| anyhow!("bot API '{method}' returned ok without a result"))
    }

    /// Fetch pending updates, long-polling up to `timeout_secs`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdatesRequest {
                    offset,
                    timeout: timeout_secs,
                },
            )
            .await?;

        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }

        Ok(updates)
    }
}

#[async_trait]
impl Messenger for BotApi {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let _: Message = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id,
                    text,
                    reply_markup: buttons.as_ref(),
                },
            )
            .await?;

        Ok(())
    }
}
