use crate::models::{Click, Link, Referral, ScheduledJob, Subscriber};
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn unix_now() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                destination_url TEXT NOT NULL,
                owner_id INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        // No foreign keys: clicks, referrals, and jobs reference link ids
        // weakly and survive a link row going missing.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                clicked_at INTEGER NOT NULL,
                referrer_id INTEGER,
                ref_code TEXT,
                source_ip TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link ON clicks(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS referrals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                referrer_id INTEGER NOT NULL,
                link_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                joined_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduled_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                scheduled_at INTEGER NOT NULL,
                message_text TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_scheduled_at ON scheduled_jobs(scheduled_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        destination_url: &str,
        owner_id: i64,
        title: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO links (destination_url, owner_id, title, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(destination_url)
        .bind(owner_id)
        .bind(title)
        .bind(unix_now()?)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_link(&self, link_id: i64) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, destination_url, owner_id, title, created_at
            FROM links
            WHERE id = ?
            "#,
        )
        .bind(link_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links_by_owner(&self, owner_id: i64) -> Result<Vec<Link>> {
        // Ordering by id rather than created_at keeps newest-first stable
        // when several links land in the same second.
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, destination_url, owner_id, title, created_at
            FROM links
            WHERE owner_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn update_link_title(&self, link_id: i64, title: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET title = ?
            WHERE id = ?
            "#,
        )
        .bind(title)
        .bind(link_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_click(
        &self,
        link_id: i64,
        referrer_id: Option<i64>,
        ref_code: Option<&str>,
        source_ip: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO clicks (link_id, clicked_at, referrer_id, ref_code, source_ip)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(link_id)
        .bind(unix_now()?)
        .bind(referrer_id)
        .bind(ref_code)
        .bind(source_ip)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn record_referral(&self, referrer_id: i64, link_id: i64) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO referrals (referrer_id, link_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(referrer_id)
        .bind(link_id)
        .bind(unix_now()?)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn count_clicks(&self, link_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM clicks WHERE link_id = ?
            "#,
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn list_clicks(&self, link_id: i64) -> Result<Vec<Click>> {
        let clicks = sqlx::query_as::<_, Click>(
            r#"
            SELECT id, link_id, clicked_at, referrer_id, ref_code, source_ip
            FROM clicks
            WHERE link_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }

    async fn count_referrals(&self, referrer_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM referrals WHERE referrer_id = ?
            "#,
        )
        .bind(referrer_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn list_referrals(&self, referrer_id: i64) -> Result<Vec<Referral>> {
        let referrals = sqlx::query_as::<_, Referral>(
            r#"
            SELECT id, referrer_id, link_id, created_at
            FROM referrals
            WHERE referrer_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(referrer_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(referrals)
    }

    async fn subscribe(&self, chat_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (chat_id, joined_at)
            VALUES (?, ?)
            ON CONFLICT(chat_id) DO NOTHING
            "#,
        )
        .bind(chat_id)
        .bind(unix_now()?)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn unsubscribe(&self, chat_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM subscribers WHERE chat_id = ?
            "#,
        )
        .bind(chat_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_subscribers(&self) -> Result<Vec<i64>> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT chat_id, joined_at FROM subscribers
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(subscribers.into_iter().map(|s| s.chat_id).collect())
    }

    async fn create_scheduled_job(
        &self,
        link_id: i64,
        scheduled_at: i64,
        message_text: &str,
        created_by: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (link_id, scheduled_at, message_text, created_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(link_id)
        .bind(scheduled_at)
        .bind(message_text)
        .bind(created_by)
        .bind(unix_now()?)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn due_scheduled_jobs(&self, now: i64) -> Result<Vec<ScheduledJob>> {
        let jobs = sqlx::query_as::<_, ScheduledJob>(
            r#"
            SELECT id, link_id, scheduled_at, message_text, created_by, created_at
            FROM scheduled_jobs
            WHERE scheduled_at <= ?
            ORDER BY scheduled_at
            "#,
        )
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(jobs)
    }

    async fn delete_scheduled_job(&self, job_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
