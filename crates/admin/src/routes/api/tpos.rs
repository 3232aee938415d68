//! TPOS sync and reconciliation handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::instrument;

use liveshop_core::reconcile::ReconcileReport;
use liveshop_core::{LiveOrderId, LivePhaseId};

use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::LiveOrder;
use crate::services::{SyncOutcome, TposSyncService};
use crate::state::AppState;

/// Build the TPOS router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/live-orders/{id}/sync", post(sync_order))
        .route("/api/live-phases/{id}/sync", post(sync_phase))
        .route("/api/live-phases/{id}/reconcile", get(reconcile))
}

/// POST /api/live-orders/{id}/sync
///
/// A TPOS rejection is stored on the order (`sync_status = failed`) and the
/// order is returned with 200.
#[instrument(skip(state))]
pub async fn sync_order(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveOrderId>,
) -> Result<Json<LiveOrder>, AppError> {
    let order = TposSyncService::new(state.pool(), state.tpos()?, state.changes())
        .sync_order(id)
        .await?;
    Ok(Json(order))
}

/// POST /api/live-phases/{id}/sync
#[instrument(skip(state))]
pub async fn sync_phase(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = TposSyncService::new(state.pool(), state.tpos()?, state.changes())
        .sync_phase(phase_id)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/live-phases/{id}/reconcile
///
/// Also records which orders TPOS confirms.
#[instrument(skip(state))]
pub async fn reconcile(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Json<ReconcileReport>, AppError> {
    let report = TposSyncService::new(state.pool(), state.tpos()?, state.changes())
        .reconcile_phase(phase_id)
        .await?;
    Ok(Json(report))
}
