//! Live session and phase API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;

use liveshop_core::{LivePhaseId, LiveSessionId, LiveSessionStatus};

use super::non_blank;
use crate::db::{LiveProductRepository, LiveSessionRepository};
use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::live::check_session_range;
use crate::models::{LivePhase, LiveSession, LiveSessionDetail, PhaseSummary};
use crate::services::{ChangeAction, ChangeEvent};
use crate::state::AppState;

/// Build the live sessions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/live-sessions", get(list).post(create))
        .route(
            "/api/live-sessions/{id}",
            get(show).put(update).delete(delete),
        )
        .route(
            "/api/live-phases/{id}/video",
            put(attach_video).delete(detach_video),
        )
        .route("/api/live-phases/{id}/summary", get(summary))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: String,
    pub status: LiveSessionStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub video_id: String,
}

fn require_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    Ok(name)
}

/// GET /api/live-sessions
pub async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<LiveSession>>, AppError> {
    Ok(Json(LiveSessionRepository::new(state.pool()).list().await?))
}

/// POST /api/live-sessions
///
/// Creates the morning and afternoon phase of every day in the range.
#[instrument(skip(state, body), fields(name = %body.name))]
pub async fn create(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<LiveSessionDetail>), AppError> {
    let name = require_name(&body.name)?;
    check_session_range(body.start_date, body.end_date)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let notes = non_blank(body.notes);
    let detail = LiveSessionRepository::new(state.pool())
        .create_with_phases(name, body.start_date, body.end_date, notes.as_deref())
        .await?;

    tracing::info!(
        session_id = %detail.session.id,
        phases = detail.phases.len(),
        "Created live session"
    );
    state.changes().publish(ChangeEvent::new(
        "live_session",
        ChangeAction::Insert,
        detail.session.id.as_i32(),
    ));
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/live-sessions/{id}
pub async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<LiveSessionId>,
) -> Result<Json<LiveSessionDetail>, AppError> {
    LiveSessionRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("live session {id}")))
}

/// PUT /api/live-sessions/{id}
#[instrument(skip(state, body))]
pub async fn update(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveSessionId>,
    Json(body): Json<UpdateSessionRequest>,
) -> Result<Json<LiveSession>, AppError> {
    let name = require_name(&body.name)?;
    let notes = non_blank(body.notes);
    let session = LiveSessionRepository::new(state.pool())
        .update(id, name, body.status, notes.as_deref())
        .await?;

    state.changes().publish(ChangeEvent::new(
        "live_session",
        ChangeAction::Update,
        id.as_i32(),
    ));
    Ok(Json(session))
}

/// DELETE /api/live-sessions/{id}
///
/// Removes the session's phases, products and orders with it.
#[instrument(skip(state))]
pub async fn delete(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveSessionId>,
) -> Result<StatusCode, AppError> {
    LiveSessionRepository::new(state.pool()).delete(id).await?;

    tracing::info!(session_id = %id, "Deleted live session");
    state.changes().publish(ChangeEvent::new(
        "live_session",
        ChangeAction::Delete,
        id.as_i32(),
    ));
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/live-phases/{id}/video
#[instrument(skip(state))]
pub async fn attach_video(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LivePhaseId>,
    Json(body): Json<VideoRequest>,
) -> Result<Json<LivePhase>, AppError> {
    let video_id = body.video_id.trim();
    if video_id.is_empty() {
        return Err(AppError::BadRequest("video_id is required".to_string()));
    }
    set_video(&state, id, Some(video_id)).await.map(Json)
}

/// DELETE /api/live-phases/{id}/video
#[instrument(skip(state))]
pub async fn detach_video(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LivePhaseId>,
) -> Result<Json<LivePhase>, AppError> {
    set_video(&state, id, None).await.map(Json)
}

async fn set_video(
    state: &AppState,
    id: LivePhaseId,
    video_id: Option<&str>,
) -> Result<LivePhase, AppError> {
    let phase = LiveSessionRepository::new(state.pool())
        .set_phase_video(id, video_id)
        .await?;

    state.changes().publish(
        ChangeEvent::new("live_phase", ChangeAction::Update, id.as_i32()).in_phase(id),
    );
    Ok(phase)
}

/// GET /api/live-phases/{id}/summary
pub async fn summary(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<LivePhaseId>,
) -> Result<Json<PhaseSummary>, AppError> {
    require_phase(&state, id).await?;
    let summary = LiveProductRepository::new(state.pool())
        .phase_summary(id)
        .await?;
    Ok(Json(summary))
}

/// Load a phase or answer 404.
pub(crate) async fn require_phase(state: &AppState, id: LivePhaseId) -> Result<LivePhase, AppError> {
    LiveSessionRepository::new(state.pool())
        .get_phase(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("live phase {id}")))
}
