//! Business logic that spans repositories and external APIs.
//!
//! # Services
//!
//! - `auth` - Staff password login (argon2)
//! - `change_feed` - Broadcast of committed writes for live boards
//! - `comments` - Facebook comment preview and import into orders
//! - `tpos_sync` - Order push, phase sync, reconciliation, product import

pub mod auth;
pub mod change_feed;
pub mod comments;
pub mod tpos_sync;

pub use auth::{AuthError, AuthService};
pub use change_feed::{ChangeAction, ChangeEvent, ChangeFeed};
pub use comments::{CommentPreview, CommentService, ImportOutcome};
pub use tpos_sync::{SyncOutcome, TposSyncService};

use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::live_orders::QuickAddError;
use crate::facebook::FacebookError;
use crate::tpos::TposError;

/// Errors returned by services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    QuickAdd(#[from] QuickAddError),

    #[error(transparent)]
    Facebook(#[from] FacebookError),

    #[error(transparent)]
    Tpos(#[from] TposError),

    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Integration credentials are missing.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Request cannot be served in the current state.
    #[error("{0}")]
    Invalid(String),
}
