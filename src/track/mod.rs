pub mod handlers;
pub mod resolver;
pub mod routes;

use url::Url;

pub use resolver::{Resolution, ResolveError, Resolver};
pub use routes::create_track_router;

/// Compose an absolute tracking link, `<base_url>/track?id=..[&ref=..][&campaign=..]`.
///
/// `base_url` is validated at startup; an unparseable value falls back to
/// plain string composition so a link is still produced.
pub fn make_track_link(
    base_url: &str,
    link_id: i64,
    referrer_id: Option<i64>,
    campaign: Option<&str>,
) -> String {
    let mut url = match Url::parse(base_url) {
        Ok(url) => url,
        Err(_) => return format!("{}/track?id={}", base_url.trim_end_matches('/'), link_id),
    };

    url.set_path("/track");
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("id", &link_id.to_string());
        if let Some(referrer) = referrer_id {
            pairs.append_pair("ref", &referrer.to_string());
        }
        if let Some(campaign) = campaign.filter(|c| !c.is_empty()) {
            pairs.append_pair("campaign", campaign);
        }
    }

    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_link_without_referrer() {
        assert_eq!(
            make_track_link("https://example.org", 7, None, None),
            "https://example.org/track?id=7"
        );
    }

    #[test]
    fn track_link_with_referrer_and_campaign() {
        assert_eq!(
            make_track_link("https://example.org", 7, Some(42), Some("spring launch")),
            "https://example.org/track?id=7&ref=42&campaign=spring+launch"
        );
    }

    #[test]
    fn track_link_ignores_base_path_and_trailing_slash() {
        assert_eq!(
            make_track_link("https://example.org/app/", 3, None, None),
            "https://example.org/track?id=3"
        );
    }
}
