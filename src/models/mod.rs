use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked destination URL. Immutable after creation except for the title.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub destination_url: String,
    pub owner_id: i64,
    pub title: String,
    pub created_at: i64,
}

/// One redirect-resolution event. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Click {
    pub id: i64,
    pub link_id: i64,
    pub clicked_at: i64,
    pub referrer_id: Option<i64>,
    pub ref_code: Option<String>,
    pub source_ip: Option<String>,
}

/// Referral attribution row, created only alongside a click that carried
/// a referrer identity. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub link_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub chat_id: i64,
    pub joined_at: i64,
}

/// A pending broadcast. Deleted exactly once after the dispatcher's send
/// attempt, regardless of per-recipient outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledJob {
    pub id: i64,
    pub link_id: i64,
    pub scheduled_at: i64,
    pub message_text: String,
    pub created_by: i64,
    pub created_at: i64,
}
