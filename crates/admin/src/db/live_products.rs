//! Live product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use liveshop_core::oversell::OversellReport;
use liveshop_core::{LivePhaseId, LiveProductId, Price, SessionIndex};

use super::RepositoryError;
use super::live_orders::recompute_product_oversell;
use crate::models::{LiveProduct, NewLiveProduct, PhaseSummary};

#[derive(Debug, sqlx::FromRow)]
struct LiveProductRow {
    id: i32,
    phase_id: i32,
    session_index: String,
    product_code: String,
    product_name: String,
    variant: Option<String>,
    price: Decimal,
    prepared_quantity: i32,
    sold_quantity: i32,
    tpos_product_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LiveProductRow> for LiveProduct {
    type Error = RepositoryError;

    fn try_from(row: LiveProductRow) -> Result<Self, Self::Error> {
        let session_index = SessionIndex::parse(&row.session_index).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid session index in database: {e}"))
        })?;

        Ok(Self {
            id: LiveProductId::new(row.id),
            phase_id: LivePhaseId::new(row.phase_id),
            session_index,
            product_code: row.product_code,
            product_name: row.product_name,
            variant: row.variant,
            price: Price::new(row.price),
            prepared_quantity: row.prepared_quantity,
            sold_quantity: row.sold_quantity,
            tpos_product_id: row.tpos_product_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, phase_id, session_index, product_code, \
    product_name, variant, price, prepared_quantity, sold_quantity, tpos_product_id, \
    created_at, updated_at";

/// Sorts "A2" before "A10".
const PRODUCT_ORDER: &str = "regexp_replace(session_index, '[0-9]+$', ''), \
    length(session_index), session_index";

#[derive(Debug, sqlx::FromRow)]
struct ProductTotalsRow {
    product_count: i64,
    total_prepared: i64,
    total_sold: i64,
    oversold_products: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderTotalsRow {
    order_count: i64,
    oversell_orders: i64,
    unsynced_orders: i64,
    revenue: Decimal,
}

/// Repository for live product database operations.
pub struct LiveProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LiveProductRepository<'a> {
    /// Create a new live product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the products of a phase in session-index order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_phase(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<Vec<LiveProduct>, RepositoryError> {
        sqlx::query_as::<_, LiveProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM liveshop.live_product WHERE phase_id = $1 \
             ORDER BY {PRODUCT_ORDER}"
        ))
        .bind(phase_id.as_i32())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LiveProductId) -> Result<Option<LiveProduct>, RepositoryError> {
        let row = sqlx::query_as::<_, LiveProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM liveshop.live_product WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Add a product to a phase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the session index is already used
    /// in the phase.
    pub async fn create(
        &self,
        phase_id: LivePhaseId,
        product: &NewLiveProduct,
    ) -> Result<LiveProduct, RepositoryError> {
        sqlx::query_as::<_, LiveProductRow>(&format!(
            r"
            INSERT INTO liveshop.live_product
                (phase_id, session_index, product_code, product_name, variant, price,
                 prepared_quantity, tpos_product_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(phase_id.as_i32())
        .bind(product.session_index.as_str())
        .bind(product.product_code.trim())
        .bind(product.product_name.trim())
        .bind(product.variant.as_deref())
        .bind(product.price.amount())
        .bind(product.prepared_quantity.max(0))
        .bind(product.tpos_product_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::conflict_or(
                e,
                &format!("session index {} already used in this phase", product.session_index),
            )
        })?
        .try_into()
    }

    /// Update a product's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update_details(
        &self,
        id: LiveProductId,
        product_name: &str,
        variant: Option<&str>,
        price: Price,
    ) -> Result<LiveProduct, RepositoryError> {
        sqlx::query_as::<_, LiveProductRow>(&format!(
            r"
            UPDATE liveshop.live_product
            SET product_name = $2, variant = $3, price = $4, updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(product_name.trim())
        .bind(variant)
        .bind(price.amount())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Set the prepared quantity and re-flag the product's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_prepared(
        &self,
        id: LiveProductId,
        prepared: i32,
    ) -> Result<(LiveProduct, OversellReport), RepositoryError> {
        self.write_prepared(id, "$2", prepared).await
    }

    /// Change the prepared quantity by `delta`, clamping the result at zero,
    /// and re-flag the product's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn adjust_prepared(
        &self,
        id: LiveProductId,
        delta: i32,
    ) -> Result<(LiveProduct, OversellReport), RepositoryError> {
        self.write_prepared(id, "prepared_quantity + $2", delta).await
    }

    async fn write_prepared(
        &self,
        id: LiveProductId,
        expression: &str,
        value: i32,
    ) -> Result<(LiveProduct, OversellReport), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            r"
            UPDATE liveshop.live_product
            SET prepared_quantity = GREATEST({expression}, 0), updated_at = now()
            WHERE id = $1
            "
        ))
        .bind(id.as_i32())
        .bind(value)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let report = recompute_product_oversell(&mut *tx, id).await?;
        let product = fetch_product(&mut *tx, id).await?;

        tx.commit().await?;
        Ok((product, report))
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product has orders and
    /// `RepositoryError::NotFound` if it doesn't exist.
    pub async fn delete(&self, id: LiveProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM liveshop.live_product WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::conflict_or(e, "product has orders"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Totals for a phase board.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn phase_summary(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<PhaseSummary, RepositoryError> {
        let products = sqlx::query_as::<_, ProductTotalsRow>(
            r"
            SELECT COUNT(*) AS product_count,
                   COALESCE(SUM(prepared_quantity), 0)::bigint AS total_prepared,
                   COALESCE(SUM(sold_quantity), 0)::bigint AS total_sold,
                   COUNT(*) FILTER (WHERE sold_quantity > prepared_quantity) AS oversold_products
            FROM liveshop.live_product
            WHERE phase_id = $1
            ",
        )
        .bind(phase_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, OrderTotalsRow>(
            r"
            SELECT COUNT(*) AS order_count,
                   COUNT(*) FILTER (WHERE o.is_oversell) AS oversell_orders,
                   COUNT(*) FILTER (WHERE o.sync_status IN ('pending', 'failed')) AS unsynced_orders,
                   COALESCE(SUM(o.quantity * p.price), 0)::numeric AS revenue
            FROM liveshop.live_order o
            JOIN liveshop.live_product p ON p.id = o.product_id
            WHERE o.phase_id = $1
            ",
        )
        .bind(phase_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(PhaseSummary {
            product_count: products.product_count,
            total_prepared: products.total_prepared,
            total_sold: products.total_sold,
            oversold_products: products.oversold_products,
            order_count: orders.order_count,
            oversell_orders: orders.oversell_orders,
            unsynced_orders: orders.unsynced_orders,
            revenue: Price::new(orders.revenue),
        })
    }
}

/// Load a product on an existing connection.
pub(crate) async fn fetch_product(
    conn: &mut PgConnection,
    id: LiveProductId,
) -> Result<LiveProduct, RepositoryError> {
    sqlx::query_as::<_, LiveProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM liveshop.live_product WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}

/// Lock the product claimed by `session_index` in a phase.
pub(crate) async fn lock_product_by_index(
    conn: &mut PgConnection,
    phase_id: LivePhaseId,
    session_index: &SessionIndex,
) -> Result<Option<LiveProduct>, RepositoryError> {
    let row = sqlx::query_as::<_, LiveProductRow>(&format!(
        r"
        SELECT {PRODUCT_COLUMNS} FROM liveshop.live_product
        WHERE phase_id = $1 AND session_index = $2
        FOR UPDATE
        "
    ))
    .bind(phase_id.as_i32())
    .bind(session_index.as_str())
    .fetch_optional(conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}
