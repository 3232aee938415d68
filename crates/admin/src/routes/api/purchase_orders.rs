//! Purchase order and goods receiving handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use liveshop_core::{Price, PurchaseOrderId, PurchaseOrderItemId, PurchaseOrderStatus};

use super::non_blank;
use crate::db::goods_receiving::ReceivingOutcome;
use crate::db::{GoodsReceivingRepository, PurchaseOrderRepository};
use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::{
    GoodsReceiving, ItemDiscrepancy, NewGoodsReceiving, NewPurchaseOrder, NewPurchaseOrderItem,
    NewReceivingItem, PurchaseOrder, PurchaseOrderDetail,
};
use crate::services::{ChangeAction, ChangeEvent};
use crate::state::AppState;

/// Build the purchasing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/purchase-orders", get(list).post(create))
        .route("/api/purchase-orders/{id}", get(show).delete(delete))
        .route("/api/purchase-orders/{id}/status", put(set_status))
        .route(
            "/api/purchase-orders/{id}/receivings",
            get(list_receivings).post(record_receiving),
        )
        .route(
            "/api/purchase-orders/{id}/discrepancies",
            get(discrepancies),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<PurchaseOrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub supplier_name: String,
    pub order_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub quantity: i32,
    pub unit_price: Price,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PurchaseOrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReceivingRequest {
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<ReceivingItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReceivingItemRequest {
    pub purchase_order_item_id: PurchaseOrderItemId,
    pub received_quantity: i32,
}

impl CreateOrderRequest {
    fn validate(self) -> Result<NewPurchaseOrder, AppError> {
        let supplier_name = self.supplier_name.trim().to_string();
        if supplier_name.is_empty() {
            return Err(AppError::BadRequest("supplier_name is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(AppError::BadRequest(
                "a purchase order needs at least one item".to_string(),
            ));
        }

        let items = self
            .items
            .into_iter()
            .map(|item| {
                if item.quantity < 1 {
                    return Err(AppError::BadRequest(format!(
                        "quantity for {} must be at least 1",
                        item.product_code
                    )));
                }
                if item.unit_price.amount().is_sign_negative() {
                    return Err(AppError::BadRequest(format!(
                        "unit_price for {} must not be negative",
                        item.product_code
                    )));
                }
                Ok(NewPurchaseOrderItem {
                    product_code: item.product_code,
                    product_name: item.product_name,
                    variant: non_blank(item.variant),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewPurchaseOrder {
            supplier_name,
            order_date: self.order_date.unwrap_or_else(|| Utc::now().date_naive()),
            notes: non_blank(self.notes),
            items,
        })
    }
}

fn order_event(action: ChangeAction, id: PurchaseOrderId) -> ChangeEvent {
    ChangeEvent::new("purchase_order", action, id.as_i32())
}

/// GET /api/purchase-orders
pub async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PurchaseOrder>>, AppError> {
    let orders = PurchaseOrderRepository::new(state.pool())
        .list(query.status)
        .await?;
    Ok(Json(orders))
}

/// POST /api/purchase-orders
#[instrument(skip(state, body), fields(supplier = %body.supplier_name))]
pub async fn create(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PurchaseOrderDetail>), AppError> {
    let order = body.validate()?;
    let detail = PurchaseOrderRepository::new(state.pool())
        .create(&order)
        .await?;

    state
        .changes()
        .publish(order_event(ChangeAction::Insert, detail.order.id));
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/purchase-orders/{id}
pub async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<PurchaseOrderDetail>, AppError> {
    PurchaseOrderRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("purchase order {id}")))
}

/// PUT /api/purchase-orders/{id}/status
#[instrument(skip(state))]
pub async fn set_status(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderRepository::new(state.pool())
        .set_status(id, body.status)
        .await?;

    state
        .changes()
        .publish(order_event(ChangeAction::Update, id));
    Ok(Json(order))
}

/// DELETE /api/purchase-orders/{id}
///
/// Only `draft` and `cancelled` orders can be deleted (409 otherwise).
#[instrument(skip(state))]
pub async fn delete(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<StatusCode, AppError> {
    PurchaseOrderRepository::new(state.pool()).delete(id).await?;

    state
        .changes()
        .publish(order_event(ChangeAction::Delete, id));
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/purchase-orders/{id}/receivings
pub async fn list_receivings(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<Vec<GoodsReceiving>>, AppError> {
    let receivings = GoodsReceivingRepository::new(state.pool())
        .list_for_order(id)
        .await?;
    Ok(Json(receivings))
}

/// POST /api/purchase-orders/{id}/receivings
#[instrument(skip(state, body, staff))]
pub async fn record_receiving(
    RequireEditor(staff): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
    Json(body): Json<ReceivingRequest>,
) -> Result<(StatusCode, Json<ReceivingOutcome>), AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest(
            "a receiving needs at least one item".to_string(),
        ));
    }
    if body.items.iter().any(|item| item.received_quantity < 0) {
        return Err(AppError::BadRequest(
            "received_quantity must not be negative".to_string(),
        ));
    }

    let receiving = NewGoodsReceiving {
        received_date: body.received_date.unwrap_or_else(|| Utc::now().date_naive()),
        received_by: Some(staff.id),
        notes: non_blank(body.notes),
        items: body
            .items
            .iter()
            .map(|item| NewReceivingItem {
                purchase_order_item_id: item.purchase_order_item_id,
                received_quantity: item.received_quantity,
            })
            .collect(),
    };

    let outcome = GoodsReceivingRepository::new(state.pool())
        .record(id, &receiving)
        .await?;

    tracing::info!(
        purchase_order_id = %id,
        status = %outcome.order.status,
        "Recorded goods receiving"
    );
    state
        .changes()
        .publish(order_event(ChangeAction::Update, id));
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/purchase-orders/{id}/discrepancies
pub async fn discrepancies(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<PurchaseOrderId>,
) -> Result<Json<Vec<ItemDiscrepancy>>, AppError> {
    let report = GoodsReceivingRepository::new(state.pool())
        .discrepancy_report(id)
        .await?;
    Ok(Json(report))
}
