//! Goods receiving repository.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use liveshop_core::{
    GoodsReceivingId, GoodsReceivingItemId, PurchaseOrderId, PurchaseOrderItemId,
    PurchaseOrderStatus, StaffUserId,
};

use super::purchase_orders::{fetch_items, write_status};
use super::{RepositoryError, parse_column};
use crate::models::purchasing::{discrepancies, status_after_receiving};
use crate::models::{
    GoodsReceiving, GoodsReceivingItem, ItemDiscrepancy, NewGoodsReceiving, PurchaseOrder,
};

#[derive(Debug, sqlx::FromRow)]
struct GoodsReceivingRow {
    id: i32,
    purchase_order_id: i32,
    received_date: NaiveDate,
    received_by: Option<i32>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl GoodsReceivingRow {
    fn into_receiving(self, items: Vec<GoodsReceivingItem>) -> GoodsReceiving {
        GoodsReceiving {
            id: GoodsReceivingId::new(self.id),
            purchase_order_id: PurchaseOrderId::new(self.purchase_order_id),
            received_date: self.received_date,
            received_by: self.received_by.map(StaffUserId::new),
            notes: self.notes,
            created_at: self.created_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GoodsReceivingItemRow {
    id: i32,
    receiving_id: i32,
    purchase_order_item_id: i32,
    received_quantity: i32,
    notes: Option<String>,
}

impl From<GoodsReceivingItemRow> for GoodsReceivingItem {
    fn from(row: GoodsReceivingItemRow) -> Self {
        Self {
            id: GoodsReceivingItemId::new(row.id),
            purchase_order_item_id: PurchaseOrderItemId::new(row.purchase_order_item_id),
            received_quantity: row.received_quantity,
            notes: row.notes,
        }
    }
}

const RECEIVING_COLUMNS: &str =
    "id, purchase_order_id, received_date, received_by, notes, created_at";
const ITEM_COLUMNS: &str =
    "id, receiving_id, purchase_order_item_id, received_quantity, notes";

/// Why a delivery could not be recorded.
#[derive(Debug, thiserror::Error)]
pub enum ReceivingError {
    /// A line refers to an item of another purchase order.
    #[error("item {0} does not belong to this purchase order")]
    ForeignItem(PurchaseOrderItemId),

    /// Cancelled purchase orders accept no deliveries.
    #[error("purchase order is cancelled")]
    OrderCancelled,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ReceivingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Outcome of recording a delivery.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivingOutcome {
    pub receiving: GoodsReceiving,
    pub order: PurchaseOrder,
    pub discrepancies: Vec<ItemDiscrepancy>,
}

/// Repository for deliveries against purchase orders.
pub struct GoodsReceivingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GoodsReceivingRepository<'a> {
    /// Create a new goods receiving repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a delivery and move the purchase order to `received` or
    /// `partially_received`.
    ///
    /// # Errors
    ///
    /// Returns `ReceivingError::ForeignItem` when a line does not belong to the
    /// order, `ReceivingError::OrderCancelled` for cancelled orders, and
    /// `RepositoryError::NotFound` when the order doesn't exist.
    pub async fn record(
        &self,
        purchase_order_id: PurchaseOrderId,
        receiving: &NewGoodsReceiving,
    ) -> Result<ReceivingOutcome, ReceivingError> {
        let mut tx = self.pool.begin().await?;

        let status: String = sqlx::query_scalar(
            "SELECT status FROM liveshop.purchase_order WHERE id = $1 FOR UPDATE",
        )
        .bind(purchase_order_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if parse_column::<PurchaseOrderStatus>(&status, "purchase order status")?
            == PurchaseOrderStatus::Cancelled
        {
            return Err(ReceivingError::OrderCancelled);
        }

        let items = fetch_items(&mut *tx, purchase_order_id).await?;
        let own_items: HashSet<PurchaseOrderItemId> = items.iter().map(|i| i.id).collect();
        if let Some(foreign) = receiving
            .items
            .iter()
            .find(|line| !own_items.contains(&line.purchase_order_item_id))
        {
            return Err(ReceivingError::ForeignItem(foreign.purchase_order_item_id));
        }

        let header = sqlx::query_as::<_, GoodsReceivingRow>(&format!(
            r"
            INSERT INTO liveshop.goods_receiving
                (purchase_order_id, received_date, received_by, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING {RECEIVING_COLUMNS}
            "
        ))
        .bind(purchase_order_id.as_i32())
        .bind(receiving.received_date)
        .bind(receiving.received_by.map(|id| id.as_i32()))
        .bind(receiving.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(receiving.items.len());
        for line in &receiving.items {
            let row = sqlx::query_as::<_, GoodsReceivingItemRow>(&format!(
                r"
                INSERT INTO liveshop.goods_receiving_item
                    (receiving_id, purchase_order_item_id, received_quantity)
                VALUES ($1, $2, $3)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(header.id)
            .bind(line.purchase_order_item_id.as_i32())
            .bind(line.received_quantity)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(row.into());
        }

        let totals = received_totals(&mut *tx, purchase_order_id).await?;
        let report = discrepancies(&items, &totals);
        let order = write_status(&mut *tx, purchase_order_id, status_after_receiving(&report)).await?;

        tx.commit().await?;

        Ok(ReceivingOutcome {
            receiving: header.into_receiving(lines),
            order,
            discrepancies: report,
        })
    }

    /// Deliveries recorded against a purchase order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_order(
        &self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<Vec<GoodsReceiving>, RepositoryError> {
        let headers = sqlx::query_as::<_, GoodsReceivingRow>(&format!(
            r"
            SELECT {RECEIVING_COLUMNS} FROM liveshop.goods_receiving
            WHERE purchase_order_id = $1
            ORDER BY received_date, id
            "
        ))
        .bind(purchase_order_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = headers.iter().map(|h| h.id).collect();
        let item_rows = sqlx::query_as::<_, GoodsReceivingItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM liveshop.goods_receiving_item \
             WHERE receiving_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_receiving: HashMap<i32, Vec<GoodsReceivingItem>> = HashMap::new();
        for row in item_rows {
            by_receiving.entry(row.receiving_id).or_default().push(row.into());
        }

        Ok(headers
            .into_iter()
            .map(|h| {
                let items = by_receiving.remove(&h.id).unwrap_or_default();
                h.into_receiving(items)
            })
            .collect())
    }

    /// Ordered vs received for every line of a purchase order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn discrepancy_report(
        &self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<Vec<ItemDiscrepancy>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM liveshop.purchase_order WHERE id = $1")
                .bind(purchase_order_id.as_i32())
                .fetch_optional(&mut *conn)
                .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let items = fetch_items(&mut *conn, purchase_order_id).await?;
        let totals = received_totals(&mut *conn, purchase_order_id).await?;
        Ok(discrepancies(&items, &totals))
    }
}

async fn received_totals(
    conn: &mut PgConnection,
    purchase_order_id: PurchaseOrderId,
) -> Result<HashMap<PurchaseOrderItemId, i64>, RepositoryError> {
    let rows: Vec<(i32, i64)> = sqlx::query_as(
        r"
        SELECT gri.purchase_order_item_id, SUM(gri.received_quantity)::bigint
        FROM liveshop.goods_receiving_item gri
        JOIN liveshop.goods_receiving gr ON gr.id = gri.receiving_id
        WHERE gr.purchase_order_id = $1
        GROUP BY gri.purchase_order_item_id
        ",
    )
    .bind(purchase_order_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, total)| (PurchaseOrderItemId::new(id), total))
        .collect())
}
