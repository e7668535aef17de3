use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::resolver::{ResolveError, Resolver};

pub struct TrackState {
    pub resolver: Resolver,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub id: Option<String>,
    #[serde(rename = "ref")]
    pub referrer: Option<String>,
    pub campaign: Option<String>,
}

/// Record the click and redirect to the destination URL.
///
/// Always a temporary redirect: destinations may be edited, so the
/// response must never be cached as permanent.
pub async fn track(
    State(state): State<Arc<TrackState>>,
    Query(query): Query<TrackQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let Some(raw_id) = query.id else {
        return (StatusCode::BAD_REQUEST, "Invalid").into_response();
    };

    let source_ip = addr.ip().to_string();

    match state
        .resolver
        .resolve(
            &raw_id,
            query.referrer.as_deref(),
            query.campaign.as_deref(),
            &source_ip,
        )
        .await
    {
        Ok(resolution) => Redirect::temporary(&resolution.destination).into_response(),
        Err(ResolveError::InvalidRequest) => {
            (StatusCode::BAD_REQUEST, "Invalid id").into_response()
        }
        Err(ResolveError::NotFound) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(ResolveError::Storage(err)) => {
            tracing::error!(error = %err, "link lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
