//! Facebook video and comment handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use liveshop_core::LivePhaseId;

use crate::error::AppError;
use crate::facebook::FacebookVideo;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::services::{CommentPreview, CommentService, ImportOutcome};
use crate::state::AppState;

/// Build the comments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/facebook/videos", get(videos))
        .route("/api/live-phases/{id}/comments", get(preview))
        .route("/api/live-phases/{id}/comments/import", post(import))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    /// Skip the cache and read from the Graph API.
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/facebook/videos
#[instrument(skip(state))]
pub async fn videos(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<Vec<FacebookVideo>>, AppError> {
    let videos = state.facebook()?.list_videos(query.refresh).await?;
    Ok(Json(Arc::unwrap_or_clone(videos)))
}

/// GET /api/live-phases/{id}/comments
#[instrument(skip(state))]
pub async fn preview(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<CommentPreview>, AppError> {
    let preview = CommentService::new(state.pool(), state.facebook()?, state.changes())
        .preview(phase_id, query.refresh)
        .await?;
    Ok(Json(preview))
}

/// POST /api/live-phases/{id}/comments/import
#[instrument(skip(state, staff))]
pub async fn import(
    RequireEditor(staff): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Json<ImportOutcome>, AppError> {
    let outcome = CommentService::new(state.pool(), state.facebook()?, state.changes())
        .import(phase_id, staff.id)
        .await?;
    Ok(Json(outcome))
}
