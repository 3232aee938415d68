//! Running-sum oversell detection.
//!
//! A product's prepared quantity is consumed by its orders in chronological
//! order. Once the cumulative quantity passes the prepared quantity, every
//! order that pushed it further is flagged oversell. An order straddling the
//! boundary counts as oversell since it cannot be filled completely.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::LiveOrderId;

/// The parts of an order that oversell computation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSlot {
    /// Order ID, used as the tie-breaker for equal timestamps.
    pub id: LiveOrderId,
    /// Units ordered.
    pub quantity: i32,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// Oversell decision for a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderFlag {
    /// The order.
    pub id: LiveOrderId,
    /// Cumulative quantity after this order.
    pub cumulative: i64,
    /// Whether the order exceeds the prepared quantity.
    pub is_oversell: bool,
}

/// Result of running oversell over one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversellReport {
    /// Per-order flags in chronological order.
    pub flags: Vec<OrderFlag>,
    /// Sum of all order quantities.
    pub total_ordered: i64,
    /// Prepared units not yet claimed (never negative).
    pub remaining: i64,
    /// Units ordered beyond the prepared quantity.
    pub oversold_units: i64,
}

impl OversellReport {
    /// IDs of the orders flagged oversell.
    #[must_use]
    pub fn oversold_ids(&self) -> Vec<LiveOrderId> {
        self.flags
            .iter()
            .filter(|f| f.is_oversell)
            .map(|f| f.id)
            .collect()
    }

    /// Number of orders flagged oversell.
    #[must_use]
    pub fn oversell_count(&self) -> usize {
        self.flags.iter().filter(|f| f.is_oversell).count()
    }
}

/// Flag every order of a product against its prepared quantity.
///
/// Orders are sorted by `created_at`, then by ID. Zero-quantity orders never
/// flag, even past the boundary.
#[must_use]
pub fn compute_oversell(prepared: i32, orders: &[OrderSlot]) -> OversellReport {
    let prepared = i64::from(prepared.max(0));

    let mut sorted: Vec<&OrderSlot> = orders.iter().collect();
    sorted.sort_by_key(|o| (o.created_at, o.id));

    let mut cumulative: i64 = 0;
    let flags = sorted
        .into_iter()
        .map(|order| {
            let quantity = i64::from(order.quantity.max(0));
            cumulative += quantity;
            OrderFlag {
                id: order.id,
                cumulative,
                is_oversell: quantity > 0 && cumulative > prepared,
            }
        })
        .collect();

    OversellReport {
        flags,
        total_ordered: cumulative,
        remaining: (prepared - cumulative).max(0),
        oversold_units: (cumulative - prepared).max(0),
    }
}

/// Whether a new order of `quantity` placed after `sold_before` units would
/// oversell.
#[must_use]
pub fn would_oversell(prepared: i32, sold_before: i32, quantity: i32) -> bool {
    quantity > 0 && i64::from(sold_before) + i64::from(quantity) > i64::from(prepared)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn slot(id: i32, quantity: i32, minute: i64) -> OrderSlot {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().unwrap_or_default();
        OrderSlot {
            id: LiveOrderId::new(id),
            quantity,
            created_at: base + Duration::minutes(minute),
        }
    }

    fn flagged(report: &OversellReport) -> Vec<i32> {
        report.oversold_ids().iter().map(LiveOrderId::as_i32).collect()
    }

    #[test]
    fn test_no_oversell_within_prepared() {
        let report = compute_oversell(5, &[slot(1, 2, 0), slot(2, 3, 1)]);
        assert!(flagged(&report).is_empty());
        assert_eq!(report.total_ordered, 5);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.oversold_units, 0);
    }

    #[test]
    fn test_orders_past_prepared_are_flagged() {
        let report = compute_oversell(3, &[slot(1, 2, 0), slot(2, 1, 1), slot(3, 1, 2)]);
        assert_eq!(flagged(&report), vec![3]);
        assert_eq!(report.oversold_units, 1);
    }

    #[test]
    fn test_straddling_order_is_flagged() {
        let report = compute_oversell(3, &[slot(1, 2, 0), slot(2, 2, 1)]);
        assert_eq!(flagged(&report), vec![2]);
    }

    #[test]
    fn test_chronological_order_wins_over_input_order() {
        // Order 9 was placed first even though it comes last in the input.
        let report = compute_oversell(1, &[slot(1, 1, 5), slot(9, 1, 0)]);
        assert_eq!(flagged(&report), vec![1]);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let report = compute_oversell(1, &[slot(4, 1, 0), slot(2, 1, 0)]);
        assert_eq!(flagged(&report), vec![4]);
    }

    #[test]
    fn test_zero_prepared_flags_everything() {
        let report = compute_oversell(0, &[slot(1, 1, 0), slot(2, 2, 1)]);
        assert_eq!(flagged(&report), vec![1, 2]);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.oversold_units, 3);
    }

    #[test]
    fn test_zero_quantity_orders_never_flag() {
        let report = compute_oversell(1, &[slot(1, 1, 0), slot(2, 0, 1)]);
        assert!(flagged(&report).is_empty());
    }

    #[test]
    fn test_empty_orders() {
        let report = compute_oversell(4, &[]);
        assert_eq!(report.remaining, 4);
        assert_eq!(report.oversell_count(), 0);
    }

    #[test]
    fn test_would_oversell() {
        assert!(!would_oversell(5, 3, 2));
        assert!(would_oversell(5, 4, 2));
        assert!(would_oversell(0, 0, 1));
        assert!(!would_oversell(0, 0, 0));
    }
}
