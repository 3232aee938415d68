//! Enumerated status flags stored as text columns.
//!
//! Every enum here round-trips through its `snake_case` name: `as_str()` is
//! what gets written to the database, `FromStr` is what reads it back.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Name of the enum that failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored `snake_case` name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Customer tag shown next to every comment and order.
    CustomerStatus("customer status") {
        Normal => "normal",
        /// Has cancelled or refused deliveries before.
        Warning => "warning",
        /// Never ship to this customer.
        Blacklisted => "blacklisted",
        Vip => "vip",
        Wholesale => "wholesale",
    }
}

impl Default for CustomerStatus {
    fn default() -> Self {
        Self::Normal
    }
}

impl CustomerStatus {
    /// Whether orders from this customer should be surfaced with a warning.
    #[must_use]
    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::Warning | Self::Blacklisted)
    }
}

text_enum! {
    /// Half-day slot of a live session day.
    PhaseKind("phase kind") {
        Morning => "morning",
        Afternoon => "afternoon",
    }
}

text_enum! {
    /// Lifecycle flag of a live session.
    LiveSessionStatus("live session status") {
        Planned => "planned",
        Live => "live",
        Ended => "ended",
    }
}

text_enum! {
    /// Whether a live order has been pushed to TPOS.
    SyncStatus("sync status") {
        Pending => "pending",
        Synced => "synced",
        Failed => "failed",
    }
}

impl SyncStatus {
    /// Orders in these states are picked up by a phase-wide sync.
    #[must_use]
    pub const fn needs_sync(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

text_enum! {
    /// Supplier purchase order status.
    PurchaseOrderStatus("purchase order status") {
        Draft => "draft",
        Ordered => "ordered",
        PartiallyReceived => "partially_received",
        Received => "received",
        Cancelled => "cancelled",
    }
}

impl PurchaseOrderStatus {
    /// Purchase orders may only be deleted while nothing depends on them.
    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Draft | Self::Cancelled)
    }
}

text_enum! {
    /// Back-office staff permission level.
    StaffRole("staff role") {
        /// Full access including staff management.
        Admin => "admin",
        /// Can create and modify live data.
        Staff => "staff",
        /// Read-only access.
        Viewer => "viewer",
    }
}

impl StaffRole {
    /// Whether this role may mutate data.
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }
}

text_enum! {
    /// Ordered vs received comparison for a purchase order line.
    DiscrepancyKind("discrepancy kind") {
        Shortage => "shortage",
        Match => "match",
        Overage => "overage",
    }
}

impl DiscrepancyKind {
    /// Classify a received quantity against the ordered quantity.
    #[must_use]
    pub const fn classify(ordered: i32, received: i64) -> Self {
        let ordered = ordered as i64;
        if received < ordered {
            Self::Shortage
        } else if received > ordered {
            Self::Overage
        } else {
            Self::Match
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_through_str() {
        for status in PurchaseOrderStatus::ALL {
            assert_eq!(status.as_str().parse::<PurchaseOrderStatus>(), Ok(*status));
        }
        for role in StaffRole::ALL {
            assert_eq!(role.to_string().parse::<StaffRole>(), Ok(*role));
        }
    }

    #[test]
    fn test_invalid_status_reports_kind() {
        let err = "shipped".parse::<SyncStatus>().unwrap_err();
        assert_eq!(err.kind, "sync status");
        assert_eq!(err.to_string(), "invalid sync status: shipped");
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&PurchaseOrderStatus::PartiallyReceived).unwrap();
        assert_eq!(json, "\"partially_received\"");
    }

    #[test]
    fn test_discrepancy_classification() {
        assert_eq!(DiscrepancyKind::classify(10, 8), DiscrepancyKind::Shortage);
        assert_eq!(DiscrepancyKind::classify(10, 10), DiscrepancyKind::Match);
        assert_eq!(DiscrepancyKind::classify(10, 12), DiscrepancyKind::Overage);
    }

    #[test]
    fn test_role_permissions() {
        assert!(StaffRole::Admin.can_edit());
        assert!(StaffRole::Staff.can_edit());
        assert!(!StaffRole::Viewer.can_edit());
    }

    #[test]
    fn test_customer_attention() {
        assert!(CustomerStatus::Blacklisted.needs_attention());
        assert!(CustomerStatus::Warning.needs_attention());
        assert!(!CustomerStatus::Vip.needs_attention());
        assert_eq!(CustomerStatus::default(), CustomerStatus::Normal);
    }
}
