//! REST API endpoints.

use crate::identity::ClientIdentity;
use crate::protocol::PlaceFailure;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use emojiplace_agents::orchestrator::RunReport;
use emojiplace_core::error::PlaceError;
use emojiplace_core::types::{AgentMessage, Pixel};
use emojiplace_runtime::cooldown::CooldownStatus;
use emojiplace_runtime::pipeline::PlaceRequest;
use emojiplace_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::warn;

/// An error rendered as a JSON response.
#[derive(Debug)]
pub enum ApiError {
    Place(PlaceError),
    NotFound(&'static str),
}

impl From<PlaceError> for ApiError {
    fn from(e: PlaceError) -> Self {
        ApiError::Place(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Place(PlaceError::StoreUnavailable(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Place(e) => {
                let status = match &e {
                    PlaceError::Validation(_) => StatusCode::BAD_REQUEST,
                    PlaceError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
                    PlaceError::StoreUnavailable(detail) => {
                        warn!("Request failed on store: {}", detail);
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                };
                (status, Json(PlaceFailure::from(&e))).into_response()
            }
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": what }))).into_response()
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": state.pipeline.clock().now_millis(),
    }))
}

/// Successful placement body.
#[derive(Debug, Serialize)]
pub struct PlaceResponse {
    pub pixel: Pixel,
    pub cooldown: CooldownStatus,
}

/// Place a pixel as the calling identity.
pub async fn place_pixel(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Json(mut req): Json<PlaceRequest>,
) -> ApiResult<PlaceResponse> {
    req.identity = identity.0;
    let placement = state.pipeline.place(req).await?;
    Ok(Json(PlaceResponse {
        pixel: placement.pixel,
        cooldown: placement.cooldown,
    }))
}

/// Read one pixel from the durable store.
pub async fn get_pixel(
    State(state): State<AppState>,
    Path((x, y)): Path<(i64, i64)>,
) -> ApiResult<Pixel> {
    state
        .pipeline
        .get_pixel(x, y)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Pixel not found"))
}

#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub pixels: Vec<Pixel>,
}

/// Read a rectangle of pixels.
pub async fn get_region(
    State(state): State<AppState>,
    Path((x, y, width, height)): Path<(i64, i64, i64, i64)>,
) -> ApiResult<RegionResponse> {
    let pixels = state.pipeline.get_region(x, y, width, height).await?;
    Ok(Json(RegionResponse { pixels }))
}

/// Cached tile contents keyed by `"x,y"`.
#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub cx: i64,
    pub cy: i64,
    pub pixels: BTreeMap<String, Pixel>,
}

pub async fn get_chunk(
    State(state): State<AppState>,
    Path((cx, cy)): Path<(i64, i64)>,
) -> ApiResult<ChunkResponse> {
    let chunk = state.pipeline.read_chunk(cx, cy).await?;
    Ok(Json(ChunkResponse {
        cx,
        cy,
        pixels: chunk.to_coord_map(),
    }))
}

pub async fn get_cooldown(
    State(state): State<AppState>,
    identity: ClientIdentity,
) -> ApiResult<CooldownStatus> {
    Ok(Json(state.pipeline.cooldown(identity.as_str()).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub identity: String,
    pub display_name: Option<String>,
    pub cooldown: CooldownStatus,
}

/// Who the caller is, as far as the canvas knows.
pub async fn get_me(
    State(state): State<AppState>,
    identity: ClientIdentity,
) -> ApiResult<MeResponse> {
    let display_name = state.pipeline.users().display_name(identity.as_str()).await?;
    let cooldown = state.pipeline.cooldown(identity.as_str()).await?;
    Ok(Json(MeResponse {
        identity: identity.0,
        display_name,
        cooldown,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    #[serde(alias = "displayName")]
    pub username: String,
}

/// Register the caller's display name.
pub async fn set_username(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Json(req): Json<UsernameRequest>,
) -> ApiResult<serde_json::Value> {
    let name = state
        .pipeline
        .set_display_name(identity.as_str(), &req.username)
        .await?;
    Ok(Json(json!({ "identity": identity.0, "displayName": name })))
}

/// Run every agent once.
pub async fn run_agents(State(state): State<AppState>) -> ApiResult<RunReport> {
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or(ApiError::NotFound("Agents are disabled"))?;
    Ok(Json(orchestrator.run_once().await))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Most recent agent messages, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Vec<AgentMessage>> {
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or(ApiError::NotFound("Agents are disabled"))?;
    Ok(Json(orchestrator.log().recent(query.limit).await?))
}
