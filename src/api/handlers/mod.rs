use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{ActiveObjectCache, ActiveObjectEntry, TrailPoint, DEFAULT_TRAIL_POINTS};
use crate::db::Database;
use crate::error::TrackingError;
use crate::events::replay_dwell;
use crate::membership::MembershipTracker;
use crate::models::*;
use crate::zones::ZoneRegistry;

/// Shared handles the read API serves from.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub cache: Arc<ActiveObjectCache>,
    pub tracker: Arc<MembershipTracker>,
    pub registry: Arc<ZoneRegistry>,
}

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Live objects
// ============================================================

#[derive(Debug, Deserialize)]
pub struct TrailQuery {
    pub max_points: Option<usize>,
}

pub async fn active_objects(
    State(state): State<AppState>,
) -> Json<HashMap<String, ActiveObjectEntry>> {
    Json(state.cache.active_objects())
}

pub async fn active_trails(
    State(state): State<AppState>,
    Query(query): Query<TrailQuery>,
) -> Json<HashMap<String, Vec<TrailPoint>>> {
    Json(
        state
            .cache
            .trails(query.max_points.unwrap_or(DEFAULT_TRAIL_POINTS)),
    )
}

pub async fn object_trail(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
    Query(query): Query<TrailQuery>,
) -> Result<Json<Vec<TrailPoint>>, (StatusCode, String)> {
    state
        .cache
        .trail(&object_id, query.max_points.unwrap_or(DEFAULT_TRAIL_POINTS))
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Object not active".to_string()))
}

// ============================================================
// Object records
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub status: Option<ObjectStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Current membership plus dwell intervals rebuilt from stored events.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectZones {
    pub object_id: String,
    pub current_zones: Vec<String>,
    pub intervals: Vec<DwellInterval>,
}

pub async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ObjectQuery>,
) -> Result<Json<Vec<ObjectRecord>>, (StatusCode, String)> {
    state
        .db
        .list_objects(query.status, query.limit)
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
) -> Result<Json<ObjectRecord>, (StatusCode, String)> {
    state
        .db
        .get_object(&object_id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Object not found".to_string()))
}

pub async fn object_history(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PositionRecord>>, (StatusCode, String)> {
    state
        .db
        .position_history(&object_id, query.start, query.end)
        .map(Json)
        .map_err(internal_error)
}

pub async fn object_zones(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
) -> Result<Json<ObjectZones>, (StatusCode, String)> {
    let events = state
        .db
        .object_zone_history(&object_id)
        .map_err(internal_error)?;

    Ok(Json(ObjectZones {
        current_zones: state.tracker.zones_of(&object_id),
        intervals: replay_dwell(&events),
        object_id,
    }))
}

// ============================================================
// Events
// ============================================================

pub async fn list_zone_events(
    State(state): State<AppState>,
    Query(filter): Query<ZoneEventFilter>,
) -> Result<Json<Vec<ZoneEvent>>, (StatusCode, String)> {
    state.db.zone_events(&filter).map(Json).map_err(internal_error)
}

pub async fn list_object_events(
    State(state): State<AppState>,
    Query(filter): Query<ObjectEventFilter>,
) -> Result<Json<Vec<ObjectEvent>>, (StatusCode, String)> {
    state
        .db
        .object_events(&filter)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Zones
// ============================================================

pub async fn list_zones(State(state): State<AppState>) -> Json<Vec<Zone>> {
    Json(state.registry.snapshot().iter().cloned().collect())
}

pub async fn reload_zones(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let registry = Arc::clone(&state.registry);
    let result = tokio::task::spawn_blocking(move || registry.reload())
        .await
        .map_err(internal_error)?;

    match result {
        Ok(count) => Ok(Json(serde_json::json!({ "zones": count }))),
        Err(e @ TrackingError::ZoneSource(_)) => {
            tracing::warn!("Zone reload failed: {}", e);
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => Err(internal_error(e)),
    }
}

// ============================================================
// Settings
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeoutSettings {
    pub timeout_secs: f64,
}

pub async fn get_timeout(State(state): State<AppState>) -> Json<TimeoutSettings> {
    Json(TimeoutSettings {
        timeout_secs: state.cache.timeout().as_secs_f64(),
    })
}

pub async fn set_timeout(
    State(state): State<AppState>,
    Json(input): Json<TimeoutSettings>,
) -> Result<Json<TimeoutSettings>, (StatusCode, String)> {
    let timeout = Duration::try_from_secs_f64(input.timeout_secs).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "timeout_secs must be a non-negative number".to_string(),
        )
    })?;

    state.cache.set_timeout(timeout);
    tracing::info!(timeout_secs = input.timeout_secs, "Active object timeout changed");

    Ok(Json(TimeoutSettings {
        timeout_secs: state.cache.timeout().as_secs_f64(),
    }))
}
