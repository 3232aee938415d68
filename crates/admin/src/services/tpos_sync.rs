//! Pushing live orders to TPOS and checking them back.
//!
//! No retries happen here. A failed push is stored on the order as
//! `sync_status = failed` with the error text, and staff re-run the sync.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use liveshop_core::reconcile::{ReconcileReport, RemoteOrderRef, reconcile};
use liveshop_core::{LiveOrderId, LivePhaseId, Price, SessionIndex, SyncStatus};

use super::ServiceError;
use super::change_feed::{ChangeAction, ChangeEvent, ChangeFeed};
use crate::db::{CustomerRepository, LiveOrderRepository, LiveProductRepository, LiveSessionRepository};
use crate::models::{Customer, LiveOrder, LiveProduct, NewLiveProduct};
use crate::tpos::{SaleOnlineOrderDetail, SaleOnlineOrderInput, TposClient};

/// Name sent for orders with neither a customer nor a commenter name.
const ANONYMOUS_BUYER: &str = "Live customer";

/// Result of syncing a phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub synced: usize,
    pub failed: usize,
    /// Error text per failed order.
    pub errors: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub order_id: LiveOrderId,
    pub error: String,
}

/// TPOS-facing operations.
pub struct TposSyncService<'a> {
    pool: &'a PgPool,
    tpos: &'a TposClient,
    changes: &'a ChangeFeed,
}

impl<'a> TposSyncService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, tpos: &'a TposClient, changes: &'a ChangeFeed) -> Self {
        Self {
            pool,
            tpos,
            changes,
        }
    }

    /// Push one order. Already synced orders are returned unchanged.
    ///
    /// A TPOS rejection is recorded on the order, not returned as an error.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the order doesn't exist, or a
    /// repository error if the outcome cannot be stored.
    #[instrument(skip(self))]
    pub async fn sync_order(&self, order_id: LiveOrderId) -> Result<LiveOrder, ServiceError> {
        let order = LiveOrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;

        if !order.sync_status.needs_sync() {
            return Ok(order);
        }
        self.push(order).await
    }

    /// Push every `pending` or `failed` order of a phase, one at a time.
    ///
    /// # Errors
    ///
    /// Returns a repository error if orders cannot be read or updated.
    #[instrument(skip(self))]
    pub async fn sync_phase(&self, phase_id: LivePhaseId) -> Result<SyncOutcome, ServiceError> {
        let pending = LiveOrderRepository::new(self.pool)
            .list_needing_sync(phase_id)
            .await?;

        let mut outcome = SyncOutcome::default();
        for order in pending {
            let updated = self.push(order).await?;
            if updated.sync_status == SyncStatus::Synced {
                outcome.synced += 1;
            } else {
                outcome.failed += 1;
                outcome.errors.push(SyncFailure {
                    order_id: updated.id,
                    error: updated.sync_error.unwrap_or_default(),
                });
            }
        }

        info!(phase_id = %phase_id, synced = outcome.synced, failed = outcome.failed, "Phase synced");
        Ok(outcome)
    }

    /// Compare the phase's orders with what TPOS holds for its video and
    /// mark the confirmed ones.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` when the phase has no video and
    /// `ServiceError::Tpos` when TPOS cannot be read.
    #[instrument(skip(self))]
    pub async fn reconcile_phase(
        &self,
        phase_id: LivePhaseId,
    ) -> Result<ReconcileReport, ServiceError> {
        let video_id = self.phase_video(phase_id).await?.ok_or_else(|| {
            ServiceError::Invalid("phase has no Facebook video attached".to_string())
        })?;

        let remote: Vec<RemoteOrderRef> = self
            .tpos
            .list_sale_online_orders_for_post(&video_id)
            .await?
            .into_iter()
            .map(|o| RemoteOrderRef {
                total_quantity: o.total_units(),
                id: o.id,
                code: o.code,
            })
            .collect();

        let orders = LiveOrderRepository::new(self.pool);
        let local = orders.reconcile_refs(phase_id).await?;
        let report = reconcile(&local, &remote);

        let updated = orders.set_confirmed(phase_id, &report.confirmed).await?;
        if updated > 0 {
            for id in &report.confirmed {
                self.changes.publish(
                    ChangeEvent::new("live_order", ChangeAction::Update, id.as_i32()).in_phase(phase_id),
                );
            }
        }

        info!(
            phase_id = %phase_id,
            confirmed = report.confirmed.len(),
            missing_remote = report.missing_remote.len(),
            remote_only = report.remote_only.len(),
            "Phase reconciled"
        );
        Ok(report)
    }

    /// Add a TPOS product to a phase under a session index.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the phase or the TPOS product
    /// doesn't exist, and a conflict if the session index is taken.
    #[instrument(skip(self))]
    pub async fn import_product(
        &self,
        phase_id: LivePhaseId,
        product_code: &str,
        session_index: SessionIndex,
        prepared_quantity: i32,
    ) -> Result<LiveProduct, ServiceError> {
        LiveSessionRepository::new(self.pool)
            .get_phase(phase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("phase {phase_id}")))?;

        let remote = self
            .tpos
            .find_product_by_code(product_code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("TPOS product {}", product_code.trim())))?;

        let product = LiveProductRepository::new(self.pool)
            .create(
                phase_id,
                &NewLiveProduct {
                    session_index,
                    product_code: remote
                        .default_code
                        .unwrap_or_else(|| product_code.trim().to_string()),
                    product_name: remote.name,
                    variant: None,
                    price: Price::new(remote.list_price),
                    prepared_quantity,
                    tpos_product_id: Some(remote.id),
                },
            )
            .await?;

        self.changes.publish(
            ChangeEvent::new("live_product", ChangeAction::Insert, product.id.as_i32())
                .in_phase(phase_id),
        );
        Ok(product)
    }

    async fn push(&self, order: LiveOrder) -> Result<LiveOrder, ServiceError> {
        let product = LiveProductRepository::new(self.pool)
            .get(order.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", order.product_id)))?;
        let customer = match order.customer_id {
            Some(id) => CustomerRepository::new(self.pool).get(id).await?,
            None => None,
        };
        let video_id = self.phase_video(order.phase_id).await?;

        let payload = build_sale_order(&order, &product, customer.as_ref(), video_id);
        let orders = LiveOrderRepository::new(self.pool);

        let updated = match self.tpos.create_sale_online_order(&payload).await {
            Ok(created) => {
                orders
                    .mark_synced(order.id, &created.id, created.code.as_deref())
                    .await?
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "TPOS sync failed");
                orders.mark_sync_failed(order.id, &err.to_string()).await?
            }
        };

        self.changes.publish(
            ChangeEvent::new("live_order", ChangeAction::Update, updated.id.as_i32())
                .in_phase(updated.phase_id),
        );
        Ok(updated)
    }

    async fn phase_video(&self, phase_id: LivePhaseId) -> Result<Option<String>, ServiceError> {
        let phase = LiveSessionRepository::new(self.pool)
            .get_phase(phase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("phase {phase_id}")))?;
        Ok(phase.facebook_video_id)
    }
}

/// Build the `SaleOnline_Order` body for a live order.
#[must_use]
pub fn build_sale_order(
    order: &LiveOrder,
    product: &LiveProduct,
    customer: Option<&Customer>,
    video_id: Option<String>,
) -> SaleOnlineOrderInput {
    let name = customer
        .map(|c| c.name.clone())
        .or_else(|| order.facebook_user_name.clone())
        .unwrap_or_else(|| ANONYMOUS_BUYER.to_string());

    let product_name = match &product.variant {
        Some(variant) => format!("{} ({variant})", product.product_name),
        None => product.product_name.clone(),
    };

    let mut note = format!("{} x{}", order.order_code, order.quantity);
    if let Some(message) = order.comment_message.as_deref().filter(|m| !m.trim().is_empty()) {
        note.push_str(" - ");
        note.push_str(message.trim());
    }

    SaleOnlineOrderInput {
        name,
        telephone: customer.and_then(|c| c.phone.as_ref().map(|p| p.as_str().to_string())),
        address: customer.and_then(|c| c.address.clone()),
        facebook_post_id: video_id,
        facebook_user_id: order.facebook_user_id.clone(),
        facebook_user_name: order.facebook_user_name.clone(),
        facebook_comment_id: order.facebook_comment_id.clone(),
        note,
        total_quantity: order.quantity,
        total_amount: (product.price * order.quantity).amount(),
        details: vec![SaleOnlineOrderDetail {
            product_id: product.tpos_product_id,
            product_code: product.product_code.clone(),
            product_name,
            price: product.price.amount(),
            quantity: order.quantity,
        }],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use liveshop_core::{CustomerId, CustomerStatus, LiveProductId, Phone};

    use super::*;

    fn product() -> LiveProduct {
        LiveProduct {
            id: LiveProductId::new(1),
            phase_id: LivePhaseId::new(1),
            session_index: SessionIndex::parse("A1").unwrap(),
            product_code: "AO01".to_string(),
            product_name: "Áo thun".to_string(),
            variant: Some("Đỏ".to_string()),
            price: Price::from_dong(150_000),
            prepared_quantity: 5,
            sold_quantity: 2,
            tpos_product_id: Some(42),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order() -> LiveOrder {
        LiveOrder {
            id: LiveOrderId::new(9),
            phase_id: LivePhaseId::new(1),
            product_id: LiveProductId::new(1),
            customer_id: Some(CustomerId::new(3)),
            order_code: "A1".to_string(),
            quantity: 2,
            is_oversell: false,
            facebook_comment_id: Some("555_1".to_string()),
            facebook_user_id: Some("999".to_string()),
            facebook_user_name: Some("Lan Nguyen".to_string()),
            comment_message: Some("A1 x2".to_string()),
            sync_status: SyncStatus::Pending,
            sync_error: None,
            tpos_order_id: None,
            tpos_order_code: None,
            tpos_confirmed: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer() -> Customer {
        Customer {
            id: CustomerId::new(3),
            name: "Lan".to_string(),
            phone: Some(Phone::parse("0912345678").unwrap()),
            facebook_id: Some("999".to_string()),
            address: Some("12 Lê Lợi".to_string()),
            status: CustomerStatus::Normal,
            info_complete: true,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_sale_order_with_customer() {
        let payload = build_sale_order(&order(), &product(), Some(&customer()), Some("555".into()));

        assert_eq!(payload.name, "Lan");
        assert_eq!(payload.telephone.as_deref(), Some("0912345678"));
        assert_eq!(payload.address.as_deref(), Some("12 Lê Lợi"));
        assert_eq!(payload.facebook_post_id.as_deref(), Some("555"));
        assert_eq!(payload.note, "A1 x2 - A1 x2");
        assert_eq!(payload.total_quantity, 2);
        assert_eq!(payload.total_amount, Decimal::from(300_000));
        assert_eq!(payload.details.len(), 1);
        assert_eq!(payload.details[0].product_name, "Áo thun (Đỏ)");
        assert_eq!(payload.details[0].product_id, Some(42));
    }

    #[test]
    fn test_build_sale_order_without_customer_uses_commenter() {
        let payload = build_sale_order(&order(), &product(), None, None);
        assert_eq!(payload.name, "Lan Nguyen");
        assert!(payload.telephone.is_none());
        assert!(payload.facebook_post_id.is_none());
    }

    #[test]
    fn test_build_sale_order_anonymous() {
        let mut order = order();
        order.facebook_user_name = None;
        order.comment_message = None;

        let payload = build_sale_order(&order, &product(), None, None);
        assert_eq!(payload.name, ANONYMOUS_BUYER);
        assert_eq!(payload.note, "A1 x2");
    }
}
