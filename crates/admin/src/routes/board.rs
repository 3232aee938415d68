//! Server-rendered pages: session overview and the live phase board.
//!
//! The board re-fetches itself when `/api/events` reports a change in its
//! phase (see `static/board.js`).

use askama::Template;
use axum::{
    Router,
    extract::{Path, State},
    response::Html,
    routing::get,
};
use tracing::instrument;

use liveshop_core::LivePhaseId;

use crate::db::{LiveOrderRepository, LiveProductRepository, LiveSessionRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireStaff;
use crate::models::{
    CurrentStaff, LiveOrder, LivePhase, LiveProduct, LiveSessionDetail, OrderFilter, PhaseSummary,
};
use crate::state::AppState;

/// Sessions shown on the overview page.
const RECENT_SESSIONS: usize = 10;

/// Build the pages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/phases/{id}/board", get(board))
}

/// Logged-in staff shown in the page header.
#[derive(Debug, Clone)]
pub struct StaffView {
    pub name: String,
    pub role: String,
}

impl From<&CurrentStaff> for StaffView {
    fn from(staff: &CurrentStaff) -> Self {
        Self {
            name: staff.name.clone(),
            role: staff.role.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseLink {
    pub id: LivePhaseId,
    pub label: String,
    pub has_video: bool,
}

impl From<&LivePhase> for PhaseLink {
    fn from(phase: &LivePhase) -> Self {
        Self {
            id: phase.id,
            label: phase_label(phase),
            has_video: phase.facebook_video_id.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionView {
    pub name: String,
    pub dates: String,
    pub status: String,
    pub phases: Vec<PhaseLink>,
}

impl From<&LiveSessionDetail> for SessionView {
    fn from(detail: &LiveSessionDetail) -> Self {
        let session = &detail.session;
        Self {
            name: session.name.clone(),
            dates: format!(
                "{} - {}",
                session.start_date.format("%d/%m/%Y"),
                session.end_date.format("%d/%m/%Y")
            ),
            status: session.status.to_string(),
            phases: detail.phases.iter().map(PhaseLink::from).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub session_index: String,
    pub product_code: String,
    pub name: String,
    pub price: String,
    pub prepared: i32,
    pub sold: i32,
    pub remaining: i32,
    pub oversold: bool,
}

impl From<&LiveProduct> for ProductRow {
    fn from(product: &LiveProduct) -> Self {
        let name = match &product.variant {
            Some(variant) => format!("{} ({variant})", product.product_name),
            None => product.product_name.clone(),
        };
        Self {
            session_index: product.session_index.to_string(),
            product_code: product.product_code.clone(),
            name,
            price: product.price.display(),
            prepared: product.prepared_quantity,
            sold: product.sold_quantity,
            remaining: product.remaining(),
            oversold: product.is_oversold(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_code: String,
    pub buyer: String,
    pub quantity: i32,
    pub is_oversell: bool,
    pub sync_status: String,
    pub time: String,
}

impl From<&LiveOrder> for OrderRow {
    fn from(order: &LiveOrder) -> Self {
        Self {
            order_code: order.order_code.clone(),
            buyer: order
                .facebook_user_name
                .clone()
                .unwrap_or_else(|| "Walk-in".to_string()),
            quantity: order.quantity,
            is_oversell: order.is_oversell,
            sync_status: order.sync_status.to_string(),
            time: order.created_at.format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "sessions/index.html")]
struct IndexTemplate {
    staff: StaffView,
    sessions: Vec<SessionView>,
}

#[derive(Template)]
#[template(path = "phases/board.html")]
struct BoardTemplate {
    staff: StaffView,
    phase_id: LivePhaseId,
    title: String,
    video_id: Option<String>,
    summary: PhaseSummary,
    revenue: String,
    products: Vec<ProductRow>,
    orders: Vec<OrderRow>,
}

fn phase_label(phase: &LivePhase) -> String {
    format!("{} {}", phase.phase_date.format("%d/%m"), phase.kind)
}

fn render(template: &impl Template) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// GET /
#[instrument(skip(staff, state))]
async fn index(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let repo = LiveSessionRepository::new(state.pool());
    let mut sessions = Vec::new();
    for session in repo.list().await?.into_iter().take(RECENT_SESSIONS) {
        if let Some(detail) = repo.get_detail(session.id).await? {
            sessions.push(SessionView::from(&detail));
        }
    }

    Ok(render(&IndexTemplate {
        staff: StaffView::from(&staff),
        sessions,
    }))
}

/// GET /phases/{id}/board
#[instrument(skip(staff, state))]
async fn board(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Path(phase_id): Path<LivePhaseId>,
) -> Result<Html<String>, AppError> {
    let sessions = LiveSessionRepository::new(state.pool());
    let phase = sessions
        .get_phase(phase_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("live phase {phase_id}")))?;
    let session_name = sessions
        .get_detail(phase.session_id)
        .await?
        .map(|detail| detail.session.name)
        .unwrap_or_default();

    let products_repo = LiveProductRepository::new(state.pool());
    let products = products_repo.list_by_phase(phase_id).await?;
    let summary = products_repo.phase_summary(phase_id).await?;
    let mut orders = LiveOrderRepository::new(state.pool())
        .list_by_phase(phase_id, OrderFilter::default())
        .await?;
    // Newest first on the board.
    orders.reverse();

    Ok(render(&BoardTemplate {
        staff: StaffView::from(&staff),
        phase_id,
        title: format!("{session_name} / {}", phase_label(&phase)),
        video_id: phase.facebook_video_id,
        revenue: summary.revenue.display(),
        summary,
        products: products.iter().map(ProductRow::from).collect(),
        orders: orders.iter().map(OrderRow::from).collect(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use liveshop_core::{LiveProductId, PhaseKind, Price, SessionIndex};

    use super::*;

    #[test]
    fn test_product_row_appends_variant() {
        let product = LiveProduct {
            id: LiveProductId::new(1),
            phase_id: LivePhaseId::new(1),
            session_index: SessionIndex::parse("b12").unwrap(),
            product_code: "VAY03".to_string(),
            product_name: "Vay hoa".to_string(),
            variant: Some("Size M".to_string()),
            price: Price::from_dong(250_000),
            prepared_quantity: 2,
            sold_quantity: 3,
            tpos_product_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let row = ProductRow::from(&product);
        assert_eq!(row.session_index, "B12");
        assert_eq!(row.name, "Vay hoa (Size M)");
        assert_eq!(row.price, "250.000 ₫");
        assert_eq!(row.remaining, 0);
        assert!(row.oversold);
    }

    #[test]
    fn test_phase_label() {
        let phase = LivePhase {
            id: LivePhaseId::new(4),
            session_id: liveshop_core::LiveSessionId::new(1),
            phase_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            kind: PhaseKind::Afternoon,
            facebook_video_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(phase_label(&phase), "09/03 afternoon");
    }
}
