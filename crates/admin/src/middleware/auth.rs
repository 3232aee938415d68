//! Authentication extractors.
//!
//! Three levels, checked from the session:
//! - `RequireStaff` - any logged-in account
//! - `RequireEditor` - accounts allowed to change data (admin, staff)
//! - `RequireAdmin` - admin only
//!
//! Anonymous HTML requests are redirected to `/login`; anonymous API requests
//! get 401.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use liveshop_core::StaffRole;

use crate::models::{CurrentStaff, session_keys};

/// Why an extractor refused the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Logged in, but the role is not enough.
    Forbidden(&'static str),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Not logged in" })),
            )
                .into_response(),
            Self::Forbidden(reason) => (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response(),
        }
    }
}

async fn current_staff(parts: &Parts) -> Result<CurrentStaff, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    session
        .get::<CurrentStaff>(session_keys::CURRENT_STAFF)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| {
            if parts.uri.path().starts_with("/api/") {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin
            }
        })
}

/// Any logged-in staff member, viewers included.
pub struct RequireStaff(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_staff(parts).await?))
    }
}

/// A staff member allowed to change data.
pub struct RequireEditor(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireEditor
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff = current_staff(parts).await?;
        if !staff.role.can_edit() {
            return Err(AuthRejection::Forbidden("Viewers cannot change data"));
        }
        Ok(Self(staff))
    }
}

/// An admin.
pub struct RequireAdmin(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff = current_staff(parts).await?;
        if staff.role != StaffRole::Admin {
            return Err(AuthRejection::Forbidden("Only admins can access this resource"));
        }
        Ok(Self(staff))
    }
}

/// The logged-in staff member, if any.
pub struct OptionalStaff(pub Option<CurrentStaff>);

impl<S> FromRequestParts<S> for OptionalStaff
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_staff(parts).await.ok()))
    }
}

/// Store the logged-in staff member in the session.
///
/// Cycles the session ID first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden("no").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthRejection::RedirectToLogin.into_response().status(),
            StatusCode::SEE_OTHER
        );
    }
}
