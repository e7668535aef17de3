//! Tracking endpoint integration tests
//!
//! These tests drive the /track route end to end: id validation, link
//! lookup, click and referral recording, and the tracking-parameter merge
//! on the redirect destination.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::{Layer, ServiceExt};
use tracklink::storage::{SqliteStorage, Storage};
use tracklink::track::{create_track_router, Resolver};
use url::Url;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_test_router(storage: &Arc<dyn Storage>) -> axum::Router {
    create_track_router(Resolver::new(Arc::clone(storage))).layer(TestConnectInfoLayer)
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Insert test ConnectInfo extension
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));

        self.inner.call(req)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("response should carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_track_redirects_with_tracking_params() {
    let storage = create_test_storage().await;
    storage
        .create_link("https://example.com/destination", 1, "")
        .await
        .unwrap();

    let app = create_test_router(&storage);
    let response = app.oneshot(get("/track?id=1")).await.unwrap();

    // Temporary redirect, never permanent: destinations may be edited
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://example.com/destination?utm_source=telegram_bot&utm_campaign=bot_share"
    );

    assert_eq!(storage.count_clicks(1).await.unwrap(), 1);
}

#[tokio::test]
async fn test_track_preserves_existing_query() {
    // The scenario from the drawing board: link id 7 pointing at a TikTok
    // video with its own query string.
    let storage = create_test_storage().await;
    for i in 1..=6 {
        storage
            .create_link(&format!("https://example.com/{i}"), 1, "")
            .await
            .unwrap();
    }
    let link_id = storage
        .create_link("https://tiktok.com/@x/video/1?foo=bar", 1, "")
        .await
        .unwrap();
    assert_eq!(link_id, 7);

    let app = create_test_router(&storage);
    let response = app
        .oneshot(get("/track?id=7&campaign=spring"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://tiktok.com/@x/video/1?foo=bar&utm_source=telegram_bot&utm_campaign=spring"
    );

    let clicks = storage.list_clicks(7).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].link_id, 7);
    assert_eq!(clicks[0].referrer_id, None);
    assert_eq!(clicks[0].ref_code.as_deref(), Some("spring"));
    assert_eq!(clicks[0].source_ip.as_deref(), Some("127.0.0.1"));
}

#[tokio::test]
async fn test_track_emits_exactly_one_tracking_pair() {
    // Pre-existing utm keys on the destination are overwritten, everything
    // else survives.
    let storage = create_test_storage().await;
    storage
        .create_link(
            "https://example.com/v?utm_source=old&keep=1&utm_campaign=stale",
            1,
            "",
        )
        .await
        .unwrap();

    let app = create_test_router(&storage);
    let response = app.oneshot(get("/track?id=1&campaign=fresh")).await.unwrap();

    let dest = Url::parse(&location(&response)).unwrap();
    let sources: Vec<_> = dest
        .query_pairs()
        .filter(|(k, _)| k == "utm_source")
        .map(|(_, v)| v.into_owned())
        .collect();
    let campaigns: Vec<_> = dest
        .query_pairs()
        .filter(|(k, _)| k == "utm_campaign")
        .map(|(_, v)| v.into_owned())
        .collect();

    assert_eq!(sources, vec!["telegram_bot"]);
    assert_eq!(campaigns, vec!["fresh"]);
    assert!(dest.query_pairs().any(|(k, v)| k == "keep" && v == "1"));
}

#[tokio::test]
async fn test_track_rejects_malformed_id() {
    let storage = create_test_storage().await;
    storage
        .create_link("https://example.com", 1, "")
        .await
        .unwrap();

    let app = create_test_router(&storage);

    for uri in ["/track", "/track?id=abc", "/track?id=-3", "/track?id=1.5"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {uri}"
        );
    }

    // No recording side effect for rejected requests
    assert_eq!(storage.count_clicks(1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_track_unknown_link_is_not_recorded() {
    let storage = create_test_storage().await;
    let app = create_test_router(&storage);

    let response = app.oneshot(get("/track?id=999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.count_clicks(999).await.unwrap(), 0);
}

#[tokio::test]
async fn test_track_records_referral_with_click() {
    let storage = create_test_storage().await;
    storage
        .create_link("https://example.com", 1, "")
        .await
        .unwrap();

    let app = create_test_router(&storage);
    let response = app.oneshot(get("/track?id=1&ref=42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    // Exactly one click and one referral, both against link 1 / referrer 42
    let clicks = storage.list_clicks(1).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].referrer_id, Some(42));

    let referrals = storage.list_referrals(42).await.unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].link_id, 1);
    assert_eq!(referrals[0].referrer_id, 42);
}

#[tokio::test]
async fn test_track_invalid_referrer_is_anonymous() {
    let storage = create_test_storage().await;
    storage
        .create_link("https://example.com", 1, "")
        .await
        .unwrap();

    let app = create_test_router(&storage);
    let response = app.oneshot(get("/track?id=1&ref=not-a-number")).await.unwrap();

    // Still redirects and records the click, but attributes no referral
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let clicks = storage.list_clicks(1).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].referrer_id, None);
    assert!(storage.list_referrals(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_tracks() {
    let storage = create_test_storage().await;
    storage
        .create_link("https://example.com", 1, "")
        .await
        .unwrap();

    let app = create_test_router(&storage);

    let mut handles = vec![];
    for _ in 0..50 {
        let app_clone = app.clone();
        handles.push(tokio::spawn(async move {
            app_clone.oneshot(get("/track?id=1")).await
        }));
    }

    let mut success_count = 0;
    for handle in handles {
        if let Ok(Ok(response)) = handle.await {
            if response.status() == StatusCode::TEMPORARY_REDIRECT {
                success_count += 1;
            }
        }
    }

    assert_eq!(success_count, 50, "All 50 redirects should succeed");
    assert_eq!(storage.count_clicks(1).await.unwrap(), 50);
}

#[tokio::test]
async fn test_health_check() {
    let storage = create_test_storage().await;
    let app = create_test_router(&storage);

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
