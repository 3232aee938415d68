//! Purchase order repository.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use liveshop_core::{Price, PurchaseOrderId, PurchaseOrderItemId, PurchaseOrderStatus};

use super::{RepositoryError, parse_column};
use crate::models::{NewPurchaseOrder, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem};

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: i32,
    supplier_name: String,
    order_date: NaiveDate,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = RepositoryError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PurchaseOrderId::new(row.id),
            supplier_name: row.supplier_name,
            order_date: row.order_date,
            status: parse_column(&row.status, "purchase order status")?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderItemRow {
    id: i32,
    purchase_order_id: i32,
    product_code: String,
    product_name: String,
    variant: Option<String>,
    quantity: i32,
    unit_price: Decimal,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        Self {
            id: PurchaseOrderItemId::new(row.id),
            purchase_order_id: PurchaseOrderId::new(row.purchase_order_id),
            product_code: row.product_code,
            product_name: row.product_name,
            variant: row.variant,
            quantity: row.quantity,
            unit_price: Price::new(row.unit_price),
        }
    }
}

const ORDER_COLUMNS: &str = "id, supplier_name, order_date, status, notes, created_at, updated_at";
const ITEM_COLUMNS: &str =
    "id, purchase_order_id, product_code, product_name, variant, quantity, unit_price";

/// Repository for supplier purchase orders.
pub struct PurchaseOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PurchaseOrderRepository<'a> {
    /// Create a new purchase order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a purchase order and its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(
        &self,
        order: &NewPurchaseOrder,
    ) -> Result<PurchaseOrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let header: PurchaseOrder = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r"
            INSERT INTO liveshop.purchase_order (supplier_name, order_date, notes)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.supplier_name.trim())
        .bind(order.order_date)
        .bind(order.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let row = sqlx::query_as::<_, PurchaseOrderItemRow>(&format!(
                r"
                INSERT INTO liveshop.purchase_order_item
                    (purchase_order_id, product_code, product_name, variant, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(header.id.as_i32())
            .bind(item.product_code.trim())
            .bind(item.product_name.trim())
            .bind(item.variant.as_deref())
            .bind(item.quantity)
            .bind(item.unit_price.amount())
            .fetch_one(&mut *tx)
            .await?;
            items.push(row.into());
        }

        tx.commit().await?;
        Ok(PurchaseOrderDetail::new(header, items))
    }

    /// List purchase orders, newest first, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PurchaseOrderStatus>,
    ) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM liveshop.purchase_order
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY order_date DESC, id DESC
            "
        ))
        .bind(status.map(PurchaseOrderStatus::as_str))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    /// Get a purchase order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrderDetail>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM liveshop.purchase_order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let items = fetch_items(&mut *conn, id).await?;

        Ok(Some(PurchaseOrderDetail::new(row.try_into()?, items)))
    }

    /// Set a purchase order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_status(
        &self,
        id: PurchaseOrderId,
        status: PurchaseOrderStatus,
    ) -> Result<PurchaseOrder, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        write_status(&mut *conn, id, status).await
    }

    /// Delete a purchase order that is still `draft` or `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist and
    /// `RepositoryError::Conflict` if its status forbids deletion.
    pub async fn delete(&self, id: PurchaseOrderId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status: String = sqlx::query_scalar(
            "SELECT status FROM liveshop.purchase_order WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let status: PurchaseOrderStatus = parse_column(&status, "purchase order status")?;
        if !status.is_deletable() {
            return Err(RepositoryError::Conflict(format!(
                "purchase order is {status}; only draft or cancelled orders can be deleted"
            )));
        }

        sqlx::query("DELETE FROM liveshop.purchase_order WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Lines of a purchase order in insertion order.
pub(crate) async fn fetch_items(
    conn: &mut PgConnection,
    id: PurchaseOrderId,
) -> Result<Vec<PurchaseOrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, PurchaseOrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM liveshop.purchase_order_item \
         WHERE purchase_order_id = $1 ORDER BY id"
    ))
    .bind(id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Write a purchase order status on an existing connection.
pub(crate) async fn write_status(
    conn: &mut PgConnection,
    id: PurchaseOrderId,
    status: PurchaseOrderStatus,
) -> Result<PurchaseOrder, RepositoryError> {
    sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        r"
        UPDATE liveshop.purchase_order SET status = $2, updated_at = now()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id.as_i32())
    .bind(status.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}
