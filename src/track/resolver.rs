use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::storage::Storage;

pub const UTM_SOURCE: &str = "telegram_bot";
pub const DEFAULT_CAMPAIGN: &str = "bot_share";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("link id must be a non-negative integer")]
    InvalidRequest,
    #[error("no link with the requested id")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub link_id: i64,
    pub referrer_id: Option<i64>,
    pub destination: String,
}

pub struct Resolver {
    storage: Arc<dyn Storage>,
}

impl Resolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolve a tracking request: validate the id, look up the link,
    /// record attribution, and compute the destination URL with tracking
    /// parameters merged in.
    ///
    /// Recording failures are logged and never surfaced; the redirect
    /// proceeds without attribution.
    pub async fn resolve(
        &self,
        raw_link_id: &str,
        referrer_id: Option<&str>,
        campaign: Option<&str>,
        source_ip: &str,
    ) -> Result<Resolution, ResolveError> {
        let link_id = raw_link_id
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id >= 0)
            .ok_or(ResolveError::InvalidRequest)?;

        // No click is recorded for a request against a non-existent link:
        // attribution only counts against real links.
        let link = self
            .storage
            .get_link(link_id)
            .await?
            .ok_or(ResolveError::NotFound)?;

        let referrer = referrer_id.and_then(|raw| raw.trim().parse::<i64>().ok());
        let campaign = campaign.filter(|c| !c.is_empty());

        match self
            .storage
            .record_click(link_id, referrer, campaign, Some(source_ip))
            .await
        {
            Ok(_) => {
                if let Some(referrer) = referrer {
                    // The referral row must never exist without its click row,
                    // so it is only written after the click succeeded.
                    if let Err(err) = self.storage.record_referral(referrer, link_id).await {
                        warn!(link_id, referrer, error = %err, "failed to record referral");
                    }
                }
            }
            Err(err) => {
                warn!(link_id, error = %err, "failed to record click");
            }
        }

        Ok(Resolution {
            link_id,
            referrer_id: referrer,
            destination: merge_tracking_params(&link.destination_url, campaign),
        })
    }
}

/// Merge `utm_source` and `utm_campaign` into a destination URL, overwriting
/// existing values for those two keys and preserving every other query
/// parameter in its original order.
pub fn merge_tracking_params(destination: &str, campaign: Option<&str>) -> String {
    let campaign = campaign
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CAMPAIGN);

    let mut url = match Url::parse(destination) {
        Ok(url) => url,
        Err(err) => {
            warn!(destination, error = %err, "destination is not a parseable URL, redirecting unmodified");
            return destination.to_string();
        }
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "utm_source" && key != "utm_campaign")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("utm_source", UTM_SOURCE);
        pairs.append_pair("utm_campaign", campaign);
    }

    url.into()
}
