//! Live-selling domain types: sessions, phases, products and orders.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use liveshop_core::{
    CustomerId, LiveOrderId, LivePhaseId, LiveProductId, LiveSessionId, LiveSessionStatus,
    PhaseKind, Price, SessionIndex, StaffUserId, SyncStatus,
};

/// A live-selling session spanning one or more days.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSession {
    pub id: LiveSessionId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LiveSessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A session together with its phases.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSessionDetail {
    #[serde(flatten)]
    pub session: LiveSession,
    pub phases: Vec<LivePhase>,
}

/// Morning or afternoon slot of a session day.
#[derive(Debug, Clone, Serialize)]
pub struct LivePhase {
    pub id: LivePhaseId,
    pub session_id: LiveSessionId,
    pub phase_date: NaiveDate,
    pub kind: PhaseKind,
    /// Facebook live video streamed during this phase.
    pub facebook_video_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Longest session, in days, that can be created in one request.
pub const MAX_SESSION_DAYS: i64 = 31;

/// Why a session date range was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionRangeError {
    #[error("end_date must not be before start_date")]
    Inverted,
    #[error("a session may span at most {MAX_SESSION_DAYS} days")]
    TooLong,
}

/// Check that a session range is ordered and at most [`MAX_SESSION_DAYS`] long.
///
/// # Errors
///
/// Returns the first rule the range breaks.
pub fn check_session_range(start: NaiveDate, end: NaiveDate) -> Result<(), SessionRangeError> {
    if end < start {
        return Err(SessionRangeError::Inverted);
    }
    if (end - start).num_days() >= MAX_SESSION_DAYS {
        return Err(SessionRangeError::TooLong);
    }
    Ok(())
}

/// Every `(date, kind)` slot between two dates, inclusive, morning first.
///
/// Returns an empty list when `end` is before `start`.
#[must_use]
pub fn phase_slots(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, PhaseKind)> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .flat_map(|day| [(day, PhaseKind::Morning), (day, PhaseKind::Afternoon)])
        .collect()
}

/// A product shown during a phase.
#[derive(Debug, Clone, Serialize)]
pub struct LiveProduct {
    pub id: LiveProductId,
    pub phase_id: LivePhaseId,
    pub session_index: SessionIndex,
    /// TPOS default code.
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub price: Price,
    pub prepared_quantity: i32,
    pub sold_quantity: i32,
    pub tpos_product_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveProduct {
    /// Prepared units not yet sold (never negative).
    #[must_use]
    pub fn remaining(&self) -> i32 {
        (self.prepared_quantity - self.sold_quantity).max(0)
    }

    /// Whether more units were sold than prepared.
    #[must_use]
    pub const fn is_oversold(&self) -> bool {
        self.sold_quantity > self.prepared_quantity
    }
}

/// A product to add to a phase.
#[derive(Debug, Clone)]
pub struct NewLiveProduct {
    pub session_index: SessionIndex,
    pub product_code: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub price: Price,
    pub prepared_quantity: i32,
    pub tpos_product_id: Option<i64>,
}

/// An order claimed during a phase.
#[derive(Debug, Clone, Serialize)]
pub struct LiveOrder {
    pub id: LiveOrderId,
    pub phase_id: LivePhaseId,
    pub product_id: LiveProductId,
    pub customer_id: Option<CustomerId>,
    /// Session index the order claimed.
    pub order_code: String,
    pub quantity: i32,
    pub is_oversell: bool,
    pub facebook_comment_id: Option<String>,
    pub facebook_user_id: Option<String>,
    pub facebook_user_name: Option<String>,
    pub comment_message: Option<String>,
    pub sync_status: SyncStatus,
    pub sync_error: Option<String>,
    pub tpos_order_id: Option<String>,
    pub tpos_order_code: Option<String>,
    pub tpos_confirmed: bool,
    pub created_by: Option<StaffUserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The Facebook comment an order came from.
#[derive(Debug, Clone, Default)]
pub struct CommentRef {
    pub comment_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub message: Option<String>,
}

/// An order to insert through quick-add.
#[derive(Debug, Clone)]
pub struct NewLiveOrder {
    pub phase_id: LivePhaseId,
    pub order_code: SessionIndex,
    pub quantity: i32,
    pub customer_id: Option<CustomerId>,
    pub comment: Option<CommentRef>,
    pub created_by: Option<StaffUserId>,
}

/// Order list query for a phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub product_id: Option<LiveProductId>,
    pub oversell_only: bool,
    pub sync_status: Option<SyncStatus>,
}

/// Totals shown at the top of a phase board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    pub product_count: i64,
    pub total_prepared: i64,
    pub total_sold: i64,
    /// Products whose sold quantity exceeds the prepared quantity.
    pub oversold_products: i64,
    pub order_count: i64,
    pub oversell_orders: i64,
    /// Orders still `pending` or `failed`.
    pub unsynced_orders: i64,
    /// Sum of quantity x price over all orders.
    pub revenue: Price,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_phase_slots_two_per_day() {
        let slots = phase_slots(date(1), date(3));
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0], (date(1), PhaseKind::Morning));
        assert_eq!(slots[1], (date(1), PhaseKind::Afternoon));
        assert_eq!(slots[5], (date(3), PhaseKind::Afternoon));
    }

    #[test]
    fn test_phase_slots_single_day() {
        assert_eq!(phase_slots(date(7), date(7)).len(), 2);
    }

    #[test]
    fn test_phase_slots_inverted_range_is_empty() {
        assert!(phase_slots(date(5), date(4)).is_empty());
    }

    #[test]
    fn test_session_range_limits() {
        assert_eq!(check_session_range(date(1), date(1)), Ok(()));
        assert_eq!(check_session_range(date(1), date(31)), Ok(()));
        assert_eq!(
            check_session_range(date(2), date(1)),
            Err(SessionRangeError::Inverted)
        );
        let april_1 = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(
            check_session_range(date(1), april_1),
            Err(SessionRangeError::TooLong)
        );
        let far = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert_eq!(
            check_session_range(date(1), far),
            Err(SessionRangeError::TooLong)
        );
    }

    #[test]
    fn test_product_remaining_never_negative() {
        let mut product = LiveProduct {
            id: LiveProductId::new(1),
            phase_id: LivePhaseId::new(1),
            session_index: SessionIndex::parse("A1").unwrap(),
            product_code: "AO01".to_string(),
            product_name: "Ao thun".to_string(),
            variant: None,
            price: Price::from_dong(150_000),
            prepared_quantity: 3,
            sold_quantity: 2,
            tpos_product_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(product.remaining(), 1);
        assert!(!product.is_oversold());

        product.sold_quantity = 5;
        assert_eq!(product.remaining(), 0);
        assert!(product.is_oversold());
    }
}
