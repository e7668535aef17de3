use crate::models::{Click, Link, Referral, ScheduledJob};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Create a tracked link and return its id (monotonically increasing)
    async fn create_link(&self, destination_url: &str, owner_id: i64, title: &str)
        -> Result<i64>;

    /// Get a link by id
    async fn get_link(&self, link_id: i64) -> Result<Option<Link>>;

    /// List a user's links, newest first
    async fn list_links_by_owner(&self, owner_id: i64) -> Result<Vec<Link>>;

    /// Update a link's title. The destination URL is immutable.
    async fn update_link_title(&self, link_id: i64, title: &str) -> Result<bool>;

    /// Append a click event and return its id
    async fn record_click(
        &self,
        link_id: i64,
        referrer_id: Option<i64>,
        ref_code: Option<&str>,
        source_ip: Option<&str>,
    ) -> Result<i64>;

    /// Append a referral attribution and return its id
    async fn record_referral(&self, referrer_id: i64, link_id: i64) -> Result<i64>;

    /// Count clicks recorded against a link
    async fn count_clicks(&self, link_id: i64) -> Result<i64>;

    /// Clicks recorded against a link, newest first
    async fn list_clicks(&self, link_id: i64) -> Result<Vec<Click>>;

    /// Count referrals attributed to a user
    async fn count_referrals(&self, referrer_id: i64) -> Result<i64>;

    /// Referrals attributed to a user, newest first
    async fn list_referrals(&self, referrer_id: i64) -> Result<Vec<Referral>>;

    /// Register a notification recipient. Idempotent.
    async fn subscribe(&self, chat_id: i64) -> Result<()>;

    /// Remove a notification recipient. No-op if absent.
    async fn unsubscribe(&self, chat_id: i64) -> Result<()>;

    /// All subscriber chat ids, order irrelevant
    async fn list_subscribers(&self) -> Result<Vec<i64>>;

    /// Insert a scheduled broadcast job and return its id
    async fn create_scheduled_job(
        &self,
        link_id: i64,
        scheduled_at: i64,
        message_text: &str,
        created_by: i64,
    ) -> Result<i64>;

    /// All jobs with scheduled_at <= now
    async fn due_scheduled_jobs(&self, now: i64) -> Result<Vec<ScheduledJob>>;

    /// Delete a job row. Returns false if it was already gone.
    async fn delete_scheduled_job(&self, job_id: i64) -> Result<bool>;
}
