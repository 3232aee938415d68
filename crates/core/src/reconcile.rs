//! Reconciliation of local live orders against orders that exist in TPOS.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::LiveOrderId;

/// A local order as seen by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOrderRef {
    /// Local order ID.
    pub id: LiveOrderId,
    /// Units ordered locally.
    pub quantity: i32,
    /// TPOS order ID recorded when the order was synced.
    pub tpos_order_id: Option<String>,
}

/// A TPOS order as seen by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrderRef {
    /// TPOS order ID.
    pub id: String,
    /// TPOS order code, for display.
    pub code: Option<String>,
    /// Sum of the order's line quantities.
    pub total_quantity: i64,
}

/// A synced order whose quantity differs between the two systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantityMismatch {
    /// Local order ID.
    pub order_id: LiveOrderId,
    /// TPOS order ID.
    pub tpos_order_id: String,
    /// Units ordered locally.
    pub local_quantity: i32,
    /// Units on the TPOS order.
    pub remote_quantity: i64,
}

/// A TPOS order with no local counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteOnly {
    /// TPOS order ID.
    pub tpos_order_id: String,
    /// TPOS order code.
    pub code: Option<String>,
}

/// Outcome of reconciling a phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Local orders present in TPOS with the same quantity.
    pub confirmed: Vec<LiveOrderId>,
    /// Local orders marked synced whose TPOS order no longer exists.
    pub missing_remote: Vec<LiveOrderId>,
    /// Local orders never synced.
    pub unsynced_local: Vec<LiveOrderId>,
    /// TPOS orders that no local order points to.
    pub remote_only: Vec<RemoteOnly>,
    /// Synced orders whose quantities disagree.
    pub quantity_mismatch: Vec<QuantityMismatch>,
}

impl ReconcileReport {
    /// Whether both systems agree completely.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_remote.is_empty()
            && self.unsynced_local.is_empty()
            && self.remote_only.is_empty()
            && self.quantity_mismatch.is_empty()
    }
}

/// Compare local orders with TPOS orders for the same live video.
#[must_use]
pub fn reconcile(local: &[LocalOrderRef], remote: &[RemoteOrderRef]) -> ReconcileReport {
    let remote_by_id: HashMap<&str, &RemoteOrderRef> =
        remote.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut referenced: HashSet<&str> = HashSet::new();
    let mut report = ReconcileReport::default();

    for order in local {
        let Some(tpos_id) = order.tpos_order_id.as_deref() else {
            report.unsynced_local.push(order.id);
            continue;
        };
        referenced.insert(tpos_id);

        match remote_by_id.get(tpos_id) {
            None => report.missing_remote.push(order.id),
            Some(remote_order) if remote_order.total_quantity != i64::from(order.quantity) => {
                report.quantity_mismatch.push(QuantityMismatch {
                    order_id: order.id,
                    tpos_order_id: tpos_id.to_string(),
                    local_quantity: order.quantity,
                    remote_quantity: remote_order.total_quantity,
                });
            }
            Some(_) => report.confirmed.push(order.id),
        }
    }

    report.remote_only = remote
        .iter()
        .filter(|r| !referenced.contains(r.id.as_str()))
        .map(|r| RemoteOnly {
            tpos_order_id: r.id.clone(),
            code: r.code.clone(),
        })
        .collect();

    report
}
