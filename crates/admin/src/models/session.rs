//! Session-related types for staff authentication.

use serde::{Deserialize, Serialize};

use liveshop_core::{Email, StaffRole, StaffUserId};

use super::StaffUser;

/// Session-stored staff identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    pub id: StaffUserId,
    pub email: Email,
    pub name: String,
    pub role: StaffRole,
}

impl From<&StaffUser> for CurrentStaff {
    fn from(user: &StaffUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";
}
