//! Login page handlers.
//!
//! The form posts back to `/login`; JSON clients use `/api/auth/login`.

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::api::auth::start_session;
use crate::error::{AppError, clear_sentry_user};
use crate::filters;
use crate::middleware::{OptionalStaff, clear_current_staff};
use crate::state::AppState;

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPageTemplate {
    error: Option<String>,
    email: String,
}

/// Build the login router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn render_login(error: Option<String>, email: String) -> Html<String> {
    Html(
        LoginPageTemplate { error, email }
            .render()
            .unwrap_or_else(|e| {
                tracing::error!("Template render error: {}", e);
                String::from("Error rendering template")
            }),
    )
}

/// GET /login
///
/// Already logged-in staff go straight to the dashboard.
async fn login_page(OptionalStaff(staff): OptionalStaff) -> Response {
    if staff.is_some() {
        return Redirect::to("/").into_response();
    }
    render_login(None, String::new()).into_response()
}

/// POST /login
async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match start_session(&state, &session, &form.email, &form.password).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(AppError::Unauthorized(message)) => {
            render_login(Some(message), form.email).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_staff(&session).await {
        tracing::warn!("Failed to clear session: {e}");
    }
    clear_sentry_user();
    Redirect::to("/login")
}
