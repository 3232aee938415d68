//! Live product API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use liveshop_core::oversell::OversellReport;
use liveshop_core::{LivePhaseId, LiveProductId, Price};

use super::live_sessions::require_phase;
use super::{non_blank, parse_session_index};
use crate::db::{LiveOrderRepository, LiveProductRepository};
use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::{LiveProduct, NewLiveProduct};
use crate::services::{ChangeAction, ChangeEvent, TposSyncService};
use crate::state::AppState;

/// Build the live products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/live-phases/{id}/products",
            get(list).post(create),
        )
        .route("/api/live-phases/{id}/products/import", post(import))
        .route("/api/live-products/{id}", put(update).delete(delete))
        .route("/api/live-products/{id}/prepared", put(set_prepared))
        .route("/api/live-products/{id}/prepared/adjust", post(adjust_prepared))
        .route("/api/live-products/{id}/oversell/recompute", post(recompute))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub session_index: String,
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub prepared_quantity: i32,
    pub tpos_product_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub product_name: String,
    pub variant: Option<String>,
    pub price: Price,
}

#[derive(Debug, Deserialize)]
pub struct ImportProductRequest {
    pub product_code: String,
    pub session_index: String,
    #[serde(default)]
    pub prepared_quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct PreparedRequest {
    pub prepared_quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i32,
}

/// A product after its prepared quantity changed, with the re-run flags.
#[derive(Debug, Serialize)]
pub struct PreparedResponse {
    pub product: LiveProduct,
    pub oversell: OversellReport,
}

fn product_event(action: ChangeAction, product: &LiveProduct) -> ChangeEvent {
    ChangeEvent::new("live_product", action, product.id.as_i32()).in_phase(product.phase_id)
}

/// GET /api/live-phases/{id}/products
pub async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Json<Vec<LiveProduct>>, AppError> {
    require_phase(&state, phase_id).await?;
    let products = LiveProductRepository::new(state.pool())
        .list_by_phase(phase_id)
        .await?;
    Ok(Json(products))
}

/// POST /api/live-phases/{id}/products
#[instrument(skip(state, body), fields(session_index = %body.session_index))]
pub async fn create(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<LiveProduct>), AppError> {
    let product_code = body.product_code.trim().to_string();
    let product_name = body.product_name.trim().to_string();
    if product_code.is_empty() || product_name.is_empty() {
        return Err(AppError::BadRequest(
            "product_code and product_name are required".to_string(),
        ));
    }
    if body.prepared_quantity < 0 {
        return Err(AppError::BadRequest(
            "prepared_quantity must not be negative".to_string(),
        ));
    }

    require_phase(&state, phase_id).await?;
    let product = LiveProductRepository::new(state.pool())
        .create(
            phase_id,
            &NewLiveProduct {
                session_index: parse_session_index(&body.session_index)?,
                product_code,
                product_name,
                variant: non_blank(body.variant),
                price: body.price,
                prepared_quantity: body.prepared_quantity,
                tpos_product_id: body.tpos_product_id,
            },
        )
        .await?;

    state
        .changes()
        .publish(product_event(ChangeAction::Insert, &product));
    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /api/live-phases/{id}/products/import
///
/// Looks the code up in TPOS and adds it with the TPOS name and price.
#[instrument(skip(state, body), fields(product_code = %body.product_code))]
pub async fn import(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
    Json(body): Json<ImportProductRequest>,
) -> Result<(StatusCode, Json<LiveProduct>), AppError> {
    let session_index = parse_session_index(&body.session_index)?;
    if body.prepared_quantity < 0 {
        return Err(AppError::BadRequest(
            "prepared_quantity must not be negative".to_string(),
        ));
    }

    let product = TposSyncService::new(state.pool(), state.tpos()?, state.changes())
        .import_product(
            phase_id,
            body.product_code.trim(),
            session_index,
            body.prepared_quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/live-products/{id}
#[instrument(skip(state, body))]
pub async fn update(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveProductId>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<LiveProduct>, AppError> {
    let name = body.product_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("product_name is required".to_string()));
    }

    let variant = non_blank(body.variant);
    let product = LiveProductRepository::new(state.pool())
        .update_details(id, name, variant.as_deref(), body.price)
        .await?;

    state
        .changes()
        .publish(product_event(ChangeAction::Update, &product));
    Ok(Json(product))
}

/// DELETE /api/live-products/{id}
///
/// Refused with 409 while the product has orders.
#[instrument(skip(state))]
pub async fn delete(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveProductId>,
) -> Result<StatusCode, AppError> {
    let repo = LiveProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("live product {id}")))?;
    repo.delete(id).await?;

    state
        .changes()
        .publish(product_event(ChangeAction::Delete, &product));
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/live-products/{id}/prepared
#[instrument(skip(state))]
pub async fn set_prepared(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveProductId>,
    Json(body): Json<PreparedRequest>,
) -> Result<Json<PreparedResponse>, AppError> {
    if body.prepared_quantity < 0 {
        return Err(AppError::BadRequest(
            "prepared_quantity must not be negative".to_string(),
        ));
    }

    let (product, oversell) = LiveProductRepository::new(state.pool())
        .set_prepared(id, body.prepared_quantity)
        .await?;
    Ok(Json(prepared_changed(&state, product, oversell)))
}

/// POST /api/live-products/{id}/prepared/adjust
///
/// The result is clamped at zero.
#[instrument(skip(state))]
pub async fn adjust_prepared(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveProductId>,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<PreparedResponse>, AppError> {
    let (product, oversell) = LiveProductRepository::new(state.pool())
        .adjust_prepared(id, body.delta)
        .await?;
    Ok(Json(prepared_changed(&state, product, oversell)))
}

/// POST /api/live-products/{id}/oversell/recompute
///
/// Rebuilds the sold quantity and oversell flags from the product's orders.
#[instrument(skip(state))]
pub async fn recompute(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveProductId>,
) -> Result<Json<PreparedResponse>, AppError> {
    let oversell = LiveOrderRepository::new(state.pool())
        .recompute_product(id)
        .await?;
    let product = LiveProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("live product {id}")))?;

    state
        .changes()
        .publish(product_event(ChangeAction::Update, &product));
    Ok(Json(PreparedResponse { product, oversell }))
}

fn prepared_changed(
    state: &AppState,
    product: LiveProduct,
    oversell: OversellReport,
) -> PreparedResponse {
    tracing::info!(
        product_id = %product.id,
        prepared = product.prepared_quantity,
        oversell_orders = oversell.oversell_count(),
        "Prepared quantity changed"
    );
    state
        .changes()
        .publish(product_event(ChangeAction::Update, &product));
    PreparedResponse { product, oversell }
}
