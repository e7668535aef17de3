use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{health_check, track, TrackState};
use super::resolver::Resolver;

pub fn create_track_router(resolver: Resolver) -> Router {
    let state = Arc::new(TrackState { resolver });

    Router::new()
        .route("/", get(health_check))
        .route("/track", get(track))
        .with_state(state)
}
