//! Scheduled notification dispatcher and subscriber fan-out.
//!
//! A fixed-interval timer task selects due scheduled jobs and fans each one
//! out to the full subscriber set. Delivery is at-most-once by design: the
//! job row is deleted after the send attempt no matter how many sends failed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use url::Url;

use crate::bot::api::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::bot::Messenger;
use crate::storage::Storage;
use crate::track::make_track_link;

/// Result of one send attempt during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub chat_id: i64,
    pub ok: bool,
}

/// Per-job fan-out outcome: one entry per subscriber, in send order.
/// Failed sends are never retried.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub outcomes: Vec<SendOutcome>,
}

impl FanoutReport {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }
}

pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    messenger: Arc<dyn Messenger>,
    base_url: String,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        messenger: Arc<dyn Messenger>,
        base_url: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            storage,
            messenger,
            base_url,
            poll_interval,
        }
    }

    /// Spawn the fixed-interval polling loop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);

            // Skip the first tick which fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;

                let now = chrono::Utc::now().timestamp();
                if let Err(err) = self.run_due_jobs(now).await {
                    warn!(error = %err, "scheduled dispatch tick failed");
                }
            }
        })
    }

    /// One dispatch tick: select jobs with `scheduled_at <= now`, fan each
    /// out, then delete the row unconditionally. Returns the per-job reports.
    pub async fn run_due_jobs(&self, now: i64) -> Result<Vec<(i64, FanoutReport)>> {
        let jobs = self.storage.due_scheduled_jobs(now).await?;
        let mut reports = Vec::with_capacity(jobs.len());

        for job in jobs {
            let report = fan_out(
                self.storage.as_ref(),
                self.messenger.as_ref(),
                &self.base_url,
                job.link_id,
                &job.message_text,
            )
            .await;

            // Deleted even when every send failed: at-most-once, no retry path.
            if let Err(err) = self.storage.delete_scheduled_job(job.id).await {
                warn!(job_id = job.id, error = %err, "failed to delete dispatched job");
            }

            info!(
                job_id = job.id,
                link_id = job.link_id,
                sent = report.sent(),
                failed = report.failed(),
                "scheduled job dispatched"
            );
            reports.push((job.id, report));
        }

        Ok(reports)
    }
}

/// Send `text` to every current subscriber, each with a personal referral
/// track link (`ref=<chat_id>`) and watch/share buttons. Send failures are
/// logged and counted; they never abort the remaining recipients.
pub async fn fan_out(
    storage: &dyn Storage,
    messenger: &dyn Messenger,
    base_url: &str,
    link_id: i64,
    text: &str,
) -> FanoutReport {
    let subscribers = match storage.list_subscribers().await {
        Ok(subscribers) => subscribers,
        Err(err) => {
            warn!(link_id, error = %err, "failed to list subscribers for fan-out");
            return FanoutReport::default();
        }
    };

    let mut report = FanoutReport::default();
    for chat_id in subscribers {
        let track_link = make_track_link(base_url, link_id, Some(chat_id), None);
        let share_text = format!("{text}\n{track_link}");
        let keyboard = share_keyboard(&track_link, &share_text);

        let ok = match messenger.send_message(chat_id, text, Some(keyboard)).await {
            Ok(()) => true,
            Err(err) => {
                warn!(chat_id, link_id, error = %err, "notification send failed");
                false
            }
        };
        report.outcomes.push(SendOutcome { chat_id, ok });
    }

    report
}

/// Watch button plus a Telegram share button pre-filled with `share_text`.
pub fn share_keyboard(track_link: &str, share_text: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton {
                text: "Watch now".to_string(),
                url: track_link.to_string(),
            }],
            vec![InlineKeyboardButton {
                text: "Share".to_string(),
                url: telegram_share_url(track_link, share_text),
            }],
        ],
    }
}

fn telegram_share_url(track_link: &str, share_text: &str) -> String {
    let mut url = Url::parse("https://t.me/share/url").unwrap();
    url.query_pairs_mut()
        .append_pair("url", track_link)
        .append_pair("text", share_text);
    url.into()
}
