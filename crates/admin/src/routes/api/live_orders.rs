//! Live order API handlers (quick add, edits, oversell recompute).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use liveshop_core::oversell::OversellReport;
use liveshop_core::{CustomerId, LiveOrderId, LivePhaseId, LiveProductId, SyncStatus};

use super::live_sessions::require_phase;
use super::parse_session_index;
use crate::db::LiveOrderRepository;
use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::{LiveOrder, LiveProduct, NewLiveOrder, OrderFilter};
use crate::services::{ChangeAction, ChangeEvent, ChangeFeed};
use crate::state::AppState;

/// Build the live orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/live-phases/{id}/orders", get(list).post(quick_add))
        .route(
            "/api/live-phases/{id}/oversell/recompute",
            post(recompute),
        )
        .route("/api/live-orders/{id}", get(show).delete(delete))
        .route("/api/live-orders/{id}/quantity", put(update_quantity))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub product_id: Option<LiveProductId>,
    #[serde(default)]
    pub oversell_only: bool,
    pub sync_status: Option<SyncStatus>,
}

#[derive(Debug, Deserialize)]
pub struct QuickAddRequest {
    /// Session code of the product, e.g. "A1".
    pub order_code: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub customer_id: Option<CustomerId>,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

/// A new order and the product it claimed.
#[derive(Debug, Serialize)]
pub struct QuickAddResponse {
    pub order: LiveOrder,
    pub product: LiveProduct,
}

#[derive(Debug, Serialize)]
pub struct ProductOversell {
    pub product_id: LiveProductId,
    #[serde(flatten)]
    pub report: OversellReport,
}

fn require_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }
    Ok(())
}

/// Publish an order change and the product change it implies.
fn publish_order(changes: &ChangeFeed, action: ChangeAction, order: &LiveOrder) {
    changes.publish(
        ChangeEvent::new("live_order", action, order.id.as_i32()).in_phase(order.phase_id),
    );
    changes.publish(
        ChangeEvent::new("live_product", ChangeAction::Update, order.product_id.as_i32())
            .in_phase(order.phase_id),
    );
}

/// GET /api/live-phases/{id}/orders
pub async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LiveOrder>>, AppError> {
    require_phase(&state, phase_id).await?;
    let filter = OrderFilter {
        product_id: query.product_id,
        oversell_only: query.oversell_only,
        sync_status: query.sync_status,
    };
    let orders = LiveOrderRepository::new(state.pool())
        .list_by_phase(phase_id, filter)
        .await?;
    Ok(Json(orders))
}

/// POST /api/live-phases/{id}/orders
///
/// Quick add by session code. An order beyond the prepared quantity is still
/// created, flagged `is_oversell`.
#[instrument(skip(state, body, staff), fields(order_code = %body.order_code))]
pub async fn quick_add(
    RequireEditor(staff): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
    Json(body): Json<QuickAddRequest>,
) -> Result<(StatusCode, Json<QuickAddResponse>), AppError> {
    require_quantity(body.quantity)?;
    let order_code = parse_session_index(&body.order_code)?;
    require_phase(&state, phase_id).await?;

    let (order, product) = LiveOrderRepository::new(state.pool())
        .quick_add(&NewLiveOrder {
            phase_id,
            order_code,
            quantity: body.quantity,
            customer_id: body.customer_id,
            comment: None,
            created_by: Some(staff.id),
        })
        .await?;

    if order.is_oversell {
        tracing::warn!(
            order_id = %order.id,
            product_id = %product.id,
            sold = product.sold_quantity,
            prepared = product.prepared_quantity,
            "Order exceeds prepared quantity"
        );
    }
    publish_order(state.changes(), ChangeAction::Insert, &order);
    Ok((StatusCode::CREATED, Json(QuickAddResponse { order, product })))
}

/// GET /api/live-orders/{id}
pub async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<LiveOrderId>,
) -> Result<Json<LiveOrder>, AppError> {
    LiveOrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("live order {id}")))
}

/// PUT /api/live-orders/{id}/quantity
#[instrument(skip(state))]
pub async fn update_quantity(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveOrderId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<LiveOrder>, AppError> {
    require_quantity(body.quantity)?;
    let order = LiveOrderRepository::new(state.pool())
        .update_quantity(id, body.quantity)
        .await?;

    publish_order(state.changes(), ChangeAction::Update, &order);
    Ok(Json(order))
}

/// DELETE /api/live-orders/{id}
#[instrument(skip(state))]
pub async fn delete(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<LiveOrderId>,
) -> Result<StatusCode, AppError> {
    let order = LiveOrderRepository::new(state.pool()).delete(id).await?;

    publish_order(state.changes(), ChangeAction::Delete, &order);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/live-phases/{id}/oversell/recompute
#[instrument(skip(state))]
pub async fn recompute(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Json<Vec<ProductOversell>>, AppError> {
    require_phase(&state, phase_id).await?;
    let reports = LiveOrderRepository::new(state.pool())
        .recompute_phase(phase_id)
        .await?;

    for (product_id, _) in &reports {
        state.changes().publish(
            ChangeEvent::new("live_product", ChangeAction::Update, product_id.as_i32())
                .in_phase(phase_id),
        );
    }
    Ok(Json(
        reports
            .into_iter()
            .map(|(product_id, report)| ProductOversell { product_id, report })
            .collect(),
    ))
}
