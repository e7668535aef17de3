pub mod api;
pub mod commands;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use api::{BotApi, InlineKeyboardMarkup};
use commands::CommandHandler;

/// Long-poll timeout for getUpdates, in seconds.
const LONG_POLL_SECS: u64 = 30;

/// Backoff after a failed getUpdates call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Outbound messaging seam. Command handlers and the dispatcher only talk
/// to the chat service through this trait, so fan-out logic is testable
/// without the network.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;
}

pub struct Bot {
    api: Arc<BotApi>,
    handler: CommandHandler,
}

impl Bot {
    pub fn new(api: Arc<BotApi>, handler: CommandHandler) -> Self {
        Self { api, handler }
    }

    /// Long-poll for updates and dispatch each inbound message. Handler
    /// errors are logged per update and never stop the loop.
    pub async fn run_polling(&self) -> Result<()> {
        let mut offset = 0i64;
        info!("Bot polling started");

        loop {
            let updates = match self.api.get_updates(offset, LONG_POLL_SECS).await {
                Ok(updates) => updates,
                Err(err) => {
                    warn!(error = %err, "getUpdates failed, backing off");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };
                let chat_id = message.chat.id;
                if let Err(err) = self.handler.handle_message(&message).await {
                    warn!(chat_id, error = %err, "update handler failed");
                }
            }
        }
    }
}
