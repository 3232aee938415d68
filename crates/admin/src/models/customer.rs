//! Customer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use liveshop_core::{CustomerId, CustomerStatus, Phone};

/// A buyer known to the shop.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<Phone>,
    /// Facebook commenter ID, set when the customer came from a live comment.
    pub facebook_id: Option<String>,
    pub address: Option<String>,
    pub status: CustomerStatus,
    /// Name, phone and address are all present. Maintained by the database.
    pub info_complete: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable customer fields.
#[derive(Debug, Clone, Default)]
pub struct CustomerFields {
    pub name: String,
    pub phone: Option<Phone>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// A customer to insert.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub fields: CustomerFields,
    pub facebook_id: Option<String>,
    pub status: CustomerStatus,
}

/// Customer list query.
#[derive(Debug, Clone)]
pub struct CustomerFilter {
    /// Case-insensitive substring of the name, or digits of the phone.
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for CustomerFilter {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}
