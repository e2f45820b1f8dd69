//! Read-only query surface over the shot store.
//!
//! Pure projections of store state at request time; nothing here can
//! trigger ingestion, and internal parse/storage detail never reaches a
//! response body.

use crate::config::ApiConfig;
use crate::store::ShotStore;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ShotStore>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn query_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Failed to query swings".to_string(),
            code: "QUERY_ERROR".to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/lastswing", get(get_last_swing))
        .route("/swings/:club", get(get_swings_by_club))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "swinglog"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "store": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "store": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Most recently persisted swing; 204 when the store is empty
async fn get_last_swing(
    State(state): State<AppState>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let latest = state.store.latest().await.map_err(|e| {
        error!(error = %e, "Failed to query last swing");
        query_error()
    })?;

    match latest {
        Some(record) => Ok((StatusCode::OK, Json(record)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// All swings for a club label; 204 when nothing matches
async fn get_swings_by_club(
    State(state): State<AppState>,
    Path(club): Path<String>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let swings = state.store.by_club(&club).await.map_err(|e| {
        error!(error = %e, club = %club, "Failed to query swings by club");
        query_error()
    })?;

    if swings.is_empty() {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((StatusCode::OK, Json(swings)).into_response())
    }
}

/// Start the query API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting query API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SwingRecord;
    use crate::store::SqliteStore;
    use axum::body::to_bytes;

    async fn state_with_store() -> AppState {
        let store: Arc<dyn ShotStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        AppState { store }
    }

    #[tokio::test]
    async fn test_last_swing_empty_store_returns_no_content() {
        let state = state_with_store().await;

        let response = get_last_swing(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_last_swing_returns_latest_record() {
        let state = state_with_store().await;
        let mut record = SwingRecord::with_identity("2024-01-01T10:00:00");
        record.club = Some("7_iron".to_string());
        record.speed = Some(90.0);
        state.store.insert(&record).await.unwrap();

        let response = get_last_swing(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let returned: SwingRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(returned.identity_key, "2024-01-01T10:00:00");
        assert_eq!(returned.speed, Some(90.0));
    }

    #[tokio::test]
    async fn test_swings_by_club_no_match_returns_no_content() {
        let state = state_with_store().await;

        let response = get_swings_by_club(State(state), Path("driver".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    /// An ingested GSPro-style shot is queryable by its derived club label.
    #[tokio::test]
    async fn test_swings_by_club_returns_ingested_shot() {
        use crate::parser::EntryParser;

        let state = state_with_store().await;
        let parser = EntryParser::ShotStream;
        let record = parser
            .parse_line(r#"{"ShotKey":"abc123","ClubIndex":1,"BallData":{"Speed":150}}"#)
            .unwrap()
            .unwrap();
        state.store.insert(&record).await.unwrap();

        let response = get_swings_by_club(State(state), Path("driver".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let returned: Vec<SwingRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].identity_key, "abc123");
        assert_eq!(returned[0].speed, Some(150.0));
    }
}
