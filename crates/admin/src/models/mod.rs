//! Domain models for the back-office.
//!
//! Repositories return these types; routes serialize them as JSON.

pub mod customer;
pub mod live;
pub mod purchasing;
pub mod session;
pub mod staff;

pub use customer::{Customer, CustomerFields, CustomerFilter, NewCustomer};
pub use live::{
    CommentRef, LiveOrder, LivePhase, LiveProduct, LiveSession, LiveSessionDetail, NewLiveOrder,
    NewLiveProduct, OrderFilter, PhaseSummary,
};
pub use purchasing::{
    GoodsReceiving, GoodsReceivingItem, ItemDiscrepancy, NewGoodsReceiving, NewPurchaseOrder,
    NewPurchaseOrderItem, NewReceivingItem, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem,
};
pub use session::{CurrentStaff, keys as session_keys};
pub use staff::StaffUser;
