//! JSON API route handlers.
//!
//! Every handler here answers JSON, including errors (`{"error": ".."}`).
//! Mutating handlers publish a change event after the write commits.

pub mod auth;
pub mod comments;
pub mod customers;
pub mod events;
pub mod live_orders;
pub mod live_products;
pub mod live_sessions;
pub mod purchase_orders;
pub mod tpos;

use axum::Router;

use liveshop_core::{Phone, SessionIndex};

use crate::error::AppError;
use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(customers::router())
        .merge(live_sessions::router())
        .merge(live_products::router())
        .merge(live_orders::router())
        .merge(comments::router())
        .merge(tpos::router())
        .merge(purchase_orders::router())
        .merge(events::router())
}

/// Normalize an optional phone field; blank means none.
pub(crate) fn parse_phone(raw: Option<&str>) -> Result<Option<Phone>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Phone::parse(value)
            .map(Some)
            .map_err(|e| AppError::BadRequest(e.to_string())),
    }
}

pub(crate) fn parse_session_index(raw: &str) -> Result<SessionIndex, AppError> {
    SessionIndex::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Trim an optional text field; blank means none.
pub(crate) fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phone_blank_is_none() {
        assert!(parse_phone(None).unwrap().is_none());
        assert!(parse_phone(Some("  ")).unwrap().is_none());
    }

    #[test]
    fn test_parse_phone_rejects_garbage() {
        assert!(matches!(
            parse_phone(Some("not a phone")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_parse_session_index_normalizes() {
        assert_eq!(parse_session_index("a1").unwrap().as_str(), "A1");
        assert!(parse_session_index("").is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ghi chu ".to_string())).as_deref(), Some("ghi chu"));
        assert_eq!(non_blank(Some("   ".to_string())), None);
    }
}
