//! Inbound chat command dispatch.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::debug;

use super::api::Message;
use super::Messenger;
use crate::dispatcher::{fan_out, share_keyboard};
use crate::storage::Storage;
use crate::track::make_track_link;

const SCHEDULE_FORMAT: &str = "%Y-%m-%d_%H:%M";

const START_TEXT: &str = "Hi! I track and promote video links.\n\n\
Paste a TikTok link here to save it and get a trackable share link, \
or use /subscribe to get notified about new videos.";

const HELP_TEXT: &str = "/start - intro\n\
/subscribe - get notified when new links are posted\n\
/unsubscribe - stop notifications\n\
/myref - your referral count\n\
/mylinks - your saved links\n\
Paste a TikTok link to save and share it.";

pub struct CommandHandler {
    storage: Arc<dyn Storage>,
    messenger: Arc<dyn Messenger>,
    base_url: String,
    admin_id: i64,
}

impl CommandHandler {
    pub fn new(
        storage: Arc<dyn Storage>,
        messenger: Arc<dyn Messenger>,
        base_url: String,
        admin_id: i64,
    ) -> Self {
        Self {
            storage,
            messenger,
            base_url,
            admin_id,
        }
    }

    pub async fn handle_message(&self, message: &Message) -> Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let issuer = message.from.as_ref().map(|u| u.id).unwrap_or(chat_id);

        if let Some((name, args)) = parse_command(text) {
            match name {
                "start" => self.reply(chat_id, START_TEXT).await,
                "help" => self.reply(chat_id, HELP_TEXT).await,
                "subscribe" => {
                    self.storage.subscribe(chat_id).await?;
                    self.reply(
                        chat_id,
                        "Subscribed - you will be notified when new links are posted.",
                    )
                    .await
                }
                "unsubscribe" => {
                    self.storage.unsubscribe(chat_id).await?;
                    self.reply(chat_id, "Unsubscribed.").await
                }
                "myref" => self.myref(chat_id, issuer).await,
                "mylinks" => self.mylinks(chat_id, issuer).await,
                "broadcast" => self.broadcast(chat_id, issuer, &args).await,
                "schedule" => self.schedule(chat_id, issuer, &args).await,
                other => {
                    debug!(command = other, "unrecognized command");
                    Ok(())
                }
            }
        } else if is_video_link(text) {
            self.save_link(message, issuer, text.trim()).await
        } else {
            self.reply(chat_id, "Send a valid TikTok link to save and share it.")
                .await
        }
    }

    async fn myref(&self, chat_id: i64, issuer: i64) -> Result<()> {
        let count = self.storage.count_referrals(issuer).await?;
        self.reply(
            chat_id,
            &format!(
                "Referrals are credited when someone opens a link you shared \
through the bot: your id rides along as the referrer.\n\n\
Referrals recorded for you: {count}"
            ),
        )
        .await
    }

    async fn mylinks(&self, chat_id: i64, issuer: i64) -> Result<()> {
        let links = self.storage.list_links_by_owner(issuer).await?;
        if links.is_empty() {
            return self.reply(chat_id, "You have no saved links yet.").await;
        }

        let mut out = Vec::with_capacity(links.len());
        for link in links {
            let track_link = make_track_link(&self.base_url, link.id, Some(issuer), None);
            let clicks = self.storage.count_clicks(link.id).await?;
            let label = if link.title.is_empty() {
                link.destination_url.as_str()
            } else {
                link.title.as_str()
            };
            out.push(format!(
                "#{} - {}\n{}\nclicks: {}",
                link.id, label, track_link, clicks
            ));
        }

        self.reply(chat_id, &out.join("\n\n")).await
    }

    /// Save a pasted destination link, reply with its tracking link, then
    /// announce it to all subscribers with per-subscriber referral links.
    async fn save_link(&self, message: &Message, issuer: i64, url: &str) -> Result<()> {
        let link_id = self.storage.create_link(url, issuer, "").await?;
        let track_link = make_track_link(&self.base_url, link_id, None, None);

        let share_text = format!(
            "Check out this video: {track_link}\nSupport it with a like and a comment!"
        );
        let keyboard = share_keyboard(&track_link, &share_text);
        self.messenger
            .send_message(
                message.chat.id,
                &format!(
                    "Link saved. Tracking link:\n{track_link}\n\n\
Stats will show up once it gets clicks."
                ),
                Some(keyboard),
            )
            .await?;

        let poster = message
            .from
            .as_ref()
            .map(|user| match &user.username {
                Some(username) => format!("@{username}"),
                None => user.first_name.clone(),
            })
            .unwrap_or_else(|| "a subscriber".to_string());

        let report = fan_out(
            self.storage.as_ref(),
            self.messenger.as_ref(),
            &self.base_url,
            link_id,
            &format!("New video from {poster}"),
        )
        .await;
        debug!(
            link_id,
            sent = report.sent(),
            failed = report.failed(),
            "new link announced"
        );

        Ok(())
    }

    async fn broadcast(&self, chat_id: i64, issuer: i64, args: &[&str]) -> Result<()> {
        if issuer != self.admin_id {
            return self.reply(chat_id, "Not authorized.").await;
        }

        let link_id = match args.first().and_then(|raw| raw.parse::<i64>().ok()) {
            Some(link_id) if args.len() >= 2 => link_id,
            _ => {
                return self
                    .reply(chat_id, "Usage: /broadcast <link_id> <text>")
                    .await;
            }
        };
        let text = args[1..].join(" ");

        let report = fan_out(
            self.storage.as_ref(),
            self.messenger.as_ref(),
            &self.base_url,
            link_id,
            &text,
        )
        .await;

        self.reply(
            chat_id,
            &format!(
                "Broadcast sent to {} subscriber(s), {} failed.",
                report.sent(),
                report.failed()
            ),
        )
        .await
    }

    async fn schedule(&self, chat_id: i64, issuer: i64, args: &[&str]) -> Result<()> {
        if issuer != self.admin_id {
            return self.reply(chat_id, "Not authorized.").await;
        }

        if args.len() < 3 {
            return self
                .reply(chat_id, "Usage: /schedule <link_id> <YYYY-MM-DD_HH:MM> <text>")
                .await;
        }

        let Some(link_id) = args[0].parse::<i64>().ok() else {
            return self
                .reply(chat_id, "Usage: /schedule <link_id> <YYYY-MM-DD_HH:MM> <text>")
                .await;
        };

        let Ok(when) = NaiveDateTime::parse_from_str(args[1], SCHEDULE_FORMAT) else {
            return self
                .reply(chat_id, "Bad timestamp. Use YYYY-MM-DD_HH:MM (UTC).")
                .await;
        };

        let text = args[2..].join(" ");
        self.storage
            .create_scheduled_job(link_id, when.and_utc().timestamp(), &text, issuer)
            .await?;

        self.reply(chat_id, "Scheduled.").await
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.messenger.send_message(chat_id, text, None).await
    }
}

fn parse_command(text: &str) -> Option<(&str, Vec<&str>)> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    // Commands in group chats arrive as /name@botname
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name, parts.collect()))
}

fn is_video_link(text: &str) -> bool {
    text.contains("tiktok.com") || text.contains("vm.tiktok.com")
}
