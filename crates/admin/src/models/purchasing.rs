//! Supplier purchase orders and goods receiving.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use liveshop_core::{
    DiscrepancyKind, GoodsReceivingId, GoodsReceivingItemId, Price, PurchaseOrderId,
    PurchaseOrderItemId, PurchaseOrderStatus, StaffUserId,
};

/// An order placed with a supplier.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier_name: String,
    pub order_date: NaiveDate,
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchase order line.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderItem {
    pub id: PurchaseOrderItemId,
    pub purchase_order_id: PurchaseOrderId,
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub quantity: i32,
    pub unit_price: Price,
}

/// A purchase order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
    /// Sum of quantity x unit price.
    pub total: Price,
}

impl PurchaseOrderDetail {
    /// Assemble a detail view, computing the order total.
    #[must_use]
    pub fn new(order: PurchaseOrder, items: Vec<PurchaseOrderItem>) -> Self {
        let total = items
            .iter()
            .map(|i| i.unit_price.times(i64::from(i.quantity)))
            .sum();
        Self {
            order,
            items,
            total,
        }
    }
}

/// A purchase order to insert.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub supplier_name: String,
    pub order_date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseOrderItem>,
}

/// A purchase order line to insert.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrderItem {
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub quantity: i32,
    pub unit_price: Price,
}

/// A delivery recorded against a purchase order.
#[derive(Debug, Clone, Serialize)]
pub struct GoodsReceiving {
    pub id: GoodsReceivingId,
    pub purchase_order_id: PurchaseOrderId,
    pub received_date: NaiveDate,
    pub received_by: Option<StaffUserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<GoodsReceivingItem>,
}

/// Quantity received for one purchase order line.
#[derive(Debug, Clone, Serialize)]
pub struct GoodsReceivingItem {
    pub id: GoodsReceivingItemId,
    pub purchase_order_item_id: PurchaseOrderItemId,
    pub received_quantity: i32,
    pub notes: Option<String>,
}

/// A delivery to record.
#[derive(Debug, Clone)]
pub struct NewGoodsReceiving {
    pub received_date: NaiveDate,
    pub received_by: Option<StaffUserId>,
    pub notes: Option<String>,
    pub items: Vec<NewReceivingItem>,
}

/// One received line of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReceivingItem {
    pub purchase_order_item_id: PurchaseOrderItemId,
    pub received_quantity: i32,
}

/// Ordered vs received for one purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDiscrepancy {
    pub item_id: PurchaseOrderItemId,
    pub product_code: String,
    pub product_name: String,
    pub ordered: i32,
    pub received: i64,
    /// `received - ordered`.
    pub difference: i64,
    pub kind: DiscrepancyKind,
}

/// Compare every line against the total received for it so far.
#[must_use]
pub fn discrepancies(
    items: &[PurchaseOrderItem],
    received: &HashMap<PurchaseOrderItemId, i64>,
) -> Vec<ItemDiscrepancy> {
    items
        .iter()
        .map(|item| {
            let total = received.get(&item.id).copied().unwrap_or(0);
            ItemDiscrepancy {
                item_id: item.id,
                product_code: item.product_code.clone(),
                product_name: item.product_name.clone(),
                ordered: item.quantity,
                received: total,
                difference: total - i64::from(item.quantity),
                kind: DiscrepancyKind::classify(item.quantity, total),
            }
        })
        .collect()
}

/// Purchase order status after a delivery: `received` once every line is
/// fully received, `partially_received` otherwise.
#[must_use]
pub fn status_after_receiving(report: &[ItemDiscrepancy]) -> PurchaseOrderStatus {
    if report.iter().all(|d| d.kind != DiscrepancyKind::Shortage) {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::PartiallyReceived
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn item(id: i32, quantity: i32) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: PurchaseOrderItemId::new(id),
            purchase_order_id: PurchaseOrderId::new(1),
            product_code: format!("SP{id:03}"),
            product_name: format!("San pham {id}"),
            variant: None,
            quantity,
            unit_price: Price::from_dong(50_000),
        }
    }

    #[test]
    fn test_discrepancy_kinds() {
        let items = [item(1, 10), item(2, 5), item(3, 4)];
        let received = HashMap::from([
            (PurchaseOrderItemId::new(1), 8),
            (PurchaseOrderItemId::new(2), 5),
            (PurchaseOrderItemId::new(3), 6),
        ]);

        let report = discrepancies(&items, &received);

        assert_eq!(report[0].kind, DiscrepancyKind::Shortage);
        assert_eq!(report[0].difference, -2);
        assert_eq!(report[1].kind, DiscrepancyKind::Match);
        assert_eq!(report[2].kind, DiscrepancyKind::Overage);
        assert_eq!(report[2].difference, 2);
        assert_eq!(status_after_receiving(&report), PurchaseOrderStatus::PartiallyReceived);
    }

    #[test]
    fn test_unreceived_line_is_shortage() {
        let report = discrepancies(&[item(1, 3)], &HashMap::new());
        assert_eq!(report[0].received, 0);
        assert_eq!(report[0].kind, DiscrepancyKind::Shortage);
    }

    #[test]
    fn test_fully_received_order() {
        let items = [item(1, 2), item(2, 1)];
        let received = HashMap::from([
            (PurchaseOrderItemId::new(1), 2),
            (PurchaseOrderItemId::new(2), 3),
        ]);
        let report = discrepancies(&items, &received);
        assert_eq!(status_after_receiving(&report), PurchaseOrderStatus::Received);
    }

    #[test]
    fn test_detail_total() {
        let detail = PurchaseOrderDetail::new(
            PurchaseOrder {
                id: PurchaseOrderId::new(1),
                supplier_name: "Xuong may Binh Tan".to_string(),
                order_date: NaiveDate::default(),
                status: PurchaseOrderStatus::Draft,
                notes: None,
                created_at: DateTime::<Utc>::default(),
                updated_at: DateTime::<Utc>::default(),
            },
            vec![item(1, 2), item(2, 3)],
        );
        assert_eq!(detail.total, Price::from_dong(250_000));
    }
}
