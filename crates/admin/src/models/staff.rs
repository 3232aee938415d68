//! Staff user domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use liveshop_core::{Email, StaffRole, StaffUserId};

/// A back-office account. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: StaffUserId,
    pub email: Email,
    pub name: String,
    pub role: StaffRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
