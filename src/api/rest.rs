//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::service::AvatarService;
use crate::storage::ObjectStore;

use super::dto::*;

/// Application state shared across handlers
pub struct AppState<S: ObjectStore> {
    pub service: Arc<AvatarService<S>>,
    pub start_time: Instant,
}

/// Create the REST API router, mounted under `base_prefix`
pub fn create_rest_router<S: ObjectStore + 'static>(
    state: Arc<AppState<S>>,
    base_prefix: &str,
) -> Router {
    let routes = Router::new()
        .route("/avatar/create", post(create_avatar_handler::<S>))
        .route("/health", get(health_handler::<S>))
        .route("/health/ready", get(ready_handler))
        .with_state(state);

    Router::new()
        .nest(base_prefix, routes)
        // 50MB limit for uploaded media
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Readiness probe handler
async fn ready_handler() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "OK".to_string(),
    })
}

/// Health handler - reports per-model runtime state
async fn health_handler<S: ObjectStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let result = state.service.health();

    let models = result
        .models
        .into_iter()
        .map(|(name, status)| {
            (
                name,
                ModelStatusDto {
                    state: status.state,
                    in_flight: status.in_flight,
                    limit: status.limit,
                },
            )
        })
        .collect();

    Json(HealthResponse {
        healthy: result.healthy,
        version: result.version,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        models,
    })
}

/// Avatar creation handler
async fn create_avatar_handler<S: ObjectStore>(
    State(state): State<Arc<AppState<S>>>,
    mut multipart: Multipart,
) -> Result<Json<CreateAvatarResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Extract the media file from multipart
    let mut file_name: Option<String> = None;
    let mut media_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(&e.to_string(), "MULTIPART_ERROR")),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "media" {
            file_name = field.file_name().map(|s| s.to_string());
            media_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| {
                        (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            Json(ErrorResponse::new(&e.to_string(), "READ_ERROR")),
                        )
                    })?
                    .to_vec(),
            );
        }
    }

    let media_data = media_data.ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new("Missing media field", "MISSING_MEDIA")),
        )
    })?;
    let file_name = file_name.unwrap_or_else(|| "media.bin".to_string());

    let result = state
        .service
        .create_avatar(&file_name, media_data)
        .await
        .map_err(|e| {
            error!("Avatar creation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::from_error(&e)),
            )
        })?;

    Ok(Json(CreateAvatarResponse {
        avatar_id: result.avatar_id,
        artifact: result.artifact,
        region: RegionDto {
            x1: result.region.x1,
            y1: result.region.y1,
            x2: result.region.x2,
            y2: result.region.y2,
        },
        duration_ms: result.duration_ms,
    }))
}
