//! Live order repository.
//!
//! Every write that changes how many units a product has sold runs in one
//! transaction with the product row locked, so `sold_quantity` and the
//! oversell flags never disagree with the orders that produced them.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use liveshop_core::oversell::{OrderSlot, OversellReport, compute_oversell, would_oversell};
use liveshop_core::reconcile::LocalOrderRef;
use liveshop_core::{
    CustomerId, LiveOrderId, LivePhaseId, LiveProductId, StaffUserId, SyncStatus,
};

use super::live_products::{fetch_product, lock_product_by_index};
use super::{RepositoryError, parse_column};
use crate::models::{LiveOrder, LiveProduct, NewLiveOrder, OrderFilter};

#[derive(Debug, sqlx::FromRow)]
struct LiveOrderRow {
    id: i32,
    phase_id: i32,
    product_id: i32,
    customer_id: Option<i32>,
    order_code: String,
    quantity: i32,
    is_oversell: bool,
    facebook_comment_id: Option<String>,
    facebook_user_id: Option<String>,
    facebook_user_name: Option<String>,
    comment_message: Option<String>,
    sync_status: String,
    sync_error: Option<String>,
    tpos_order_id: Option<String>,
    tpos_order_code: Option<String>,
    tpos_confirmed: bool,
    created_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LiveOrderRow> for LiveOrder {
    type Error = RepositoryError;

    fn try_from(row: LiveOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LiveOrderId::new(row.id),
            phase_id: LivePhaseId::new(row.phase_id),
            product_id: LiveProductId::new(row.product_id),
            customer_id: row.customer_id.map(CustomerId::new),
            order_code: row.order_code,
            quantity: row.quantity,
            is_oversell: row.is_oversell,
            facebook_comment_id: row.facebook_comment_id,
            facebook_user_id: row.facebook_user_id,
            facebook_user_name: row.facebook_user_name,
            comment_message: row.comment_message,
            sync_status: parse_column(&row.sync_status, "sync status")?,
            sync_error: row.sync_error,
            tpos_order_id: row.tpos_order_id,
            tpos_order_code: row.tpos_order_code,
            tpos_confirmed: row.tpos_confirmed,
            created_by: row.created_by.map(StaffUserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, phase_id, product_id, customer_id, order_code, quantity, \
    is_oversell, facebook_comment_id, facebook_user_id, facebook_user_name, comment_message, \
    sync_status, sync_error, tpos_order_id, tpos_order_code, tpos_confirmed, created_by, \
    created_at, updated_at";

/// Why a quick-add could not create an order.
#[derive(Debug, thiserror::Error)]
pub enum QuickAddError {
    /// No product in the phase carries the claimed session index.
    #[error("no product with code {0} in this phase")]
    UnknownCode(String),

    /// The comment already produced an order for this product.
    #[error("comment already ordered this product")]
    DuplicateComment,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for QuickAddError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Repository for live order database operations.
pub struct LiveOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LiveOrderRepository<'a> {
    /// Create a new live order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an order from a session code typed by staff or found in a comment.
    ///
    /// Locks the claimed product, bumps its sold quantity and flags the order
    /// oversell when the sold quantity before it leaves no room for it.
    ///
    /// # Errors
    ///
    /// Returns `QuickAddError::UnknownCode` when the code matches no product of
    /// the phase and `QuickAddError::DuplicateComment` when the comment was
    /// already turned into an order for that product.
    pub async fn quick_add(
        &self,
        order: &NewLiveOrder,
    ) -> Result<(LiveOrder, LiveProduct), QuickAddError> {
        let mut tx = self.pool.begin().await?;

        let product = lock_product_by_index(&mut *tx, order.phase_id, &order.order_code)
            .await?
            .ok_or_else(|| QuickAddError::UnknownCode(order.order_code.to_string()))?;

        let (sold, prepared): (i32, i32) = sqlx::query_as(
            r"
            UPDATE liveshop.live_product
            SET sold_quantity = sold_quantity + $2, updated_at = now()
            WHERE id = $1
            RETURNING sold_quantity, prepared_quantity
            ",
        )
        .bind(product.id.as_i32())
        .bind(order.quantity)
        .fetch_one(&mut *tx)
        .await?;

        let is_oversell = would_oversell(prepared, sold - order.quantity, order.quantity);
        let comment = order.comment.as_ref();

        let row = sqlx::query_as::<_, LiveOrderRow>(&format!(
            r"
            INSERT INTO liveshop.live_order
                (phase_id, product_id, customer_id, order_code, quantity, is_oversell,
                 facebook_comment_id, facebook_user_id, facebook_user_name, comment_message,
                 created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, clock_timestamp())
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.phase_id.as_i32())
        .bind(product.id.as_i32())
        .bind(order.customer_id.map(|id| id.as_i32()))
        .bind(order.order_code.as_str())
        .bind(order.quantity)
        .bind(is_oversell)
        .bind(comment.map(|c| c.comment_id.as_str()))
        .bind(comment.and_then(|c| c.user_id.as_deref()))
        .bind(comment.and_then(|c| c.user_name.as_deref()))
        .bind(comment.and_then(|c| c.message.as_deref()))
        .bind(order.created_by.map(|id| id.as_i32()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                QuickAddError::DuplicateComment
            }
            other => QuickAddError::from(other),
        })?;

        let product = fetch_product(&mut *tx, product.id).await?;
        tx.commit().await?;

        Ok((row.try_into()?, product))
    }

    /// List the orders of a phase, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_phase(
        &self,
        phase_id: LivePhaseId,
        filter: OrderFilter,
    ) -> Result<Vec<LiveOrder>, RepositoryError> {
        sqlx::query_as::<_, LiveOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM liveshop.live_order
            WHERE phase_id = $1
              AND ($2::int IS NULL OR product_id = $2)
              AND (NOT $3 OR is_oversell)
              AND ($4::text IS NULL OR sync_status = $4)
            ORDER BY created_at, id
            "
        ))
        .bind(phase_id.as_i32())
        .bind(filter.product_id.map(|id| id.as_i32()))
        .bind(filter.oversell_only)
        .bind(filter.sync_status.map(SyncStatus::as_str))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LiveOrderId) -> Result<Option<LiveOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, LiveOrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM liveshop.live_order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Change an order's quantity, moving the product's sold quantity by the
    /// difference and re-flagging the product's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_quantity(
        &self,
        id: LiveOrderId,
        quantity: i32,
    ) -> Result<LiveOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id = lock_order_product(&mut *tx, id).await?;
        let previous: i32 = sqlx::query_scalar(
            "SELECT quantity FROM liveshop.live_order WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            r"
            UPDATE liveshop.live_product
            SET sold_quantity = sold_quantity + $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(product_id.as_i32())
        .bind(quantity - previous)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE liveshop.live_order SET quantity = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_i32())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        recompute_product_oversell(&mut *tx, product_id).await?;

        let order = fetch_order(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Delete an order, giving its units back to the product.
    ///
    /// Returns the deleted order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn delete(&self, id: LiveOrderId) -> Result<LiveOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_order_product(&mut *tx, id).await?;

        let order: LiveOrder = sqlx::query_as::<_, LiveOrderRow>(&format!(
            "DELETE FROM liveshop.live_order WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()?;

        sqlx::query(
            r"
            UPDATE liveshop.live_product
            SET sold_quantity = sold_quantity - $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(order.product_id.as_i32())
        .bind(order.quantity)
        .execute(&mut *tx)
        .await?;

        recompute_product_oversell(&mut *tx, order.product_id).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Re-flag the orders of one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn recompute_product(
        &self,
        product_id: LiveProductId,
    ) -> Result<OversellReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let report = recompute_product_oversell(&mut *tx, product_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Re-flag the orders of every product in a phase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn recompute_phase(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<Vec<(LiveProductId, OversellReport)>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_ids: Vec<i32> = sqlx::query_scalar(
            "SELECT id FROM liveshop.live_product WHERE phase_id = $1 ORDER BY id",
        )
        .bind(phase_id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        let mut reports = Vec::with_capacity(product_ids.len());
        for id in product_ids.into_iter().map(LiveProductId::new) {
            reports.push((id, recompute_product_oversell(&mut *tx, id).await?));
        }

        tx.commit().await?;
        Ok(reports)
    }

    /// `(comment_id, product_id)` pairs that already produced an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn linked_comments(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<Vec<(String, LiveProductId)>, RepositoryError> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            r"
            SELECT facebook_comment_id, product_id FROM liveshop.live_order
            WHERE phase_id = $1 AND facebook_comment_id IS NOT NULL
            ",
        )
        .bind(phase_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(comment, product)| (comment, LiveProductId::new(product)))
            .collect())
    }

    /// Orders of a phase that a sync should push, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_needing_sync(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<Vec<LiveOrder>, RepositoryError> {
        sqlx::query_as::<_, LiveOrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM liveshop.live_order
            WHERE phase_id = $1 AND sync_status IN ('pending', 'failed')
            ORDER BY created_at, id
            "
        ))
        .bind(phase_id.as_i32())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    /// Record a successful push to TPOS.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_synced(
        &self,
        id: LiveOrderId,
        tpos_order_id: &str,
        tpos_order_code: Option<&str>,
    ) -> Result<LiveOrder, RepositoryError> {
        sqlx::query_as::<_, LiveOrderRow>(&format!(
            r"
            UPDATE liveshop.live_order
            SET sync_status = 'synced', sync_error = NULL,
                tpos_order_id = $2, tpos_order_code = $3, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(tpos_order_id)
        .bind(tpos_order_code)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Record a failed push to TPOS.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_sync_failed(
        &self,
        id: LiveOrderId,
        error: &str,
    ) -> Result<LiveOrder, RepositoryError> {
        sqlx::query_as::<_, LiveOrderRow>(&format!(
            r"
            UPDATE liveshop.live_order
            SET sync_status = 'failed', sync_error = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(error)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// The orders of a phase as reconciliation input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reconcile_refs(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<Vec<LocalOrderRef>, RepositoryError> {
        let rows: Vec<(i32, i32, Option<String>)> = sqlx::query_as(
            r"
            SELECT id, quantity, tpos_order_id FROM liveshop.live_order
            WHERE phase_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(phase_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, quantity, tpos_order_id)| LocalOrderRef {
                id: LiveOrderId::new(id),
                quantity,
                tpos_order_id,
            })
            .collect())
    }

    /// Set `tpos_confirmed` on exactly the given orders of a phase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_confirmed(
        &self,
        phase_id: LivePhaseId,
        confirmed: &[LiveOrderId],
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = confirmed.iter().map(LiveOrderId::as_i32).collect();
        let result = sqlx::query(
            r"
            UPDATE liveshop.live_order
            SET tpos_confirmed = (id = ANY($2)), updated_at = now()
            WHERE phase_id = $1 AND tpos_confirmed <> (id = ANY($2))
            ",
        )
        .bind(phase_id.as_i32())
        .bind(&ids)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Lock the product an order belongs to.
///
/// Writers lock the product row before any of its order rows.
async fn lock_order_product(
    conn: &mut PgConnection,
    id: LiveOrderId,
) -> Result<LiveProductId, RepositoryError> {
    let product_id: i32 =
        sqlx::query_scalar("SELECT product_id FROM liveshop.live_order WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RepositoryError::NotFound)?;

    sqlx::query("SELECT id FROM liveshop.live_product WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    Ok(LiveProductId::new(product_id))
}

async fn fetch_order(conn: &mut PgConnection, id: LiveOrderId) -> Result<LiveOrder, RepositoryError> {
    sqlx::query_as::<_, LiveOrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM liveshop.live_order WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}

/// Recompute the oversell flags of one product and write back the ones that
/// changed. `sold_quantity` is reset to the sum of the product's orders.
///
/// Must run inside a transaction; the product row stays locked until commit.
pub(crate) async fn recompute_product_oversell(
    conn: &mut PgConnection,
    product_id: LiveProductId,
) -> Result<OversellReport, RepositoryError> {
    let prepared: i32 = sqlx::query_scalar(
        "SELECT prepared_quantity FROM liveshop.live_product WHERE id = $1 FOR UPDATE",
    )
    .bind(product_id.as_i32())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let slots: Vec<(i32, i32, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, quantity, created_at FROM liveshop.live_order WHERE product_id = $1",
    )
    .bind(product_id.as_i32())
    .fetch_all(&mut *conn)
    .await?;

    let slots: Vec<OrderSlot> = slots
        .into_iter()
        .map(|(id, quantity, created_at)| OrderSlot {
            id: LiveOrderId::new(id),
            quantity,
            created_at,
        })
        .collect();

    let report = compute_oversell(prepared, &slots);
    let oversold: Vec<i32> = report.oversold_ids().iter().map(LiveOrderId::as_i32).collect();

    sqlx::query(
        r"
        UPDATE liveshop.live_order
        SET is_oversell = (id = ANY($2)), updated_at = now()
        WHERE product_id = $1 AND is_oversell <> (id = ANY($2))
        ",
    )
    .bind(product_id.as_i32())
    .bind(&oversold)
    .execute(&mut *conn)
    .await?;

    let sold = i32::try_from(report.total_ordered).map_err(|_| {
        RepositoryError::DataCorruption(format!("sold quantity overflow on product {product_id}"))
    })?;
    sqlx::query(
        "UPDATE liveshop.live_product SET sold_quantity = $2 WHERE id = $1 AND sold_quantity <> $2",
    )
    .bind(product_id.as_i32())
    .bind(sold)
    .execute(&mut *conn)
    .await?;

    Ok(report)
}
