//! Staff login API.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireStaff, clear_current_staff, set_current_staff};
use crate::models::CurrentStaff;
use crate::services::AuthService;
use crate::state::AppState;

/// Build the auth API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Check credentials and start a session.
///
/// Shared with the HTML login form.
pub(crate) async fn start_session(
    state: &AppState,
    session: &Session,
    email: &str,
    password: &str,
) -> Result<CurrentStaff, AppError> {
    let user = AuthService::new(state.pool()).login(email, password).await?;
    let staff = CurrentStaff::from(&user);

    set_current_staff(session, &staff)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(staff.id.as_i32(), Some(staff.email.as_str()));

    tracing::info!(staff_id = %staff.id, role = %staff.role, "Staff logged in");
    Ok(staff)
}

/// POST /api/auth/login
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentStaff>, AppError> {
    let staff = start_session(&state, &session, &body.email, &body.password).await?;
    Ok(Json(staff))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_staff(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(RequireStaff(staff): RequireStaff) -> Json<CurrentStaff> {
    Json(staff)
}
