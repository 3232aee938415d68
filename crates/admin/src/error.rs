//! Unified error handling for the back-office.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::goods_receiving::ReceivingError;
use crate::db::live_orders::QuickAddError;
use crate::facebook::FacebookError;
use crate::services::ServiceError;
use crate::services::auth::AuthError;
use crate::tpos::TposError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Facebook Graph API call failed.
    #[error("Facebook error: {0}")]
    Facebook(#[from] FacebookError),

    /// TPOS API call failed.
    #[error("TPOS error: {0}")]
    Tpos(#[from] TposError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource not found".to_string()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

impl From<QuickAddError> for AppError {
    fn from(err: QuickAddError) -> Self {
        match err {
            QuickAddError::UnknownCode(_) => Self::BadRequest(err.to_string()),
            QuickAddError::DuplicateComment => Self::Conflict(err.to_string()),
            QuickAddError::Repository(e) => e.into(),
        }
    }
}

impl From<ReceivingError> for AppError {
    fn from(err: ReceivingError) -> Self {
        match err {
            ReceivingError::ForeignItem(_) => Self::BadRequest(err.to_string()),
            ReceivingError::OrderCancelled => Self::Conflict(err.to_string()),
            ReceivingError::Repository(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidEmail(_) => {
                Self::Unauthorized(AuthError::InvalidCredentials.to_string())
            }
            AuthError::WeakPassword => Self::BadRequest(err.to_string()),
            AuthError::PasswordHash => Self::Internal(err.to_string()),
            AuthError::Repository(e) => e.into(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Repository(e) => e.into(),
            ServiceError::QuickAdd(e) => e.into(),
            ServiceError::Facebook(e) => Self::Facebook(e),
            ServiceError::Tpos(e) => Self::Tpos(e),
            ServiceError::NotFound(what) => Self::NotFound(what),
            ServiceError::NotConfigured(_) | ServiceError::Invalid(_) => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Facebook(_) | Self::Tpos(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Facebook(_) | Self::Tpos(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Facebook(_) | Self::Tpos(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context from a staff user ID.
pub fn set_sentry_user(staff_user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(staff_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::Conflict("session index A1 already used".to_string());
        assert_eq!(err.to_string(), "Conflict: session index A1 already used");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_http() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("product has orders".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_quick_add_errors_map_to_http() {
        assert_eq!(
            get_status(QuickAddError::UnknownCode("Z9".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(QuickAddError::DuplicateComment.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_not_configured_is_bad_request() {
        assert_eq!(
            get_status(ServiceError::NotConfigured("TPOS").into()),
            StatusCode::BAD_REQUEST
        );
    }
}
