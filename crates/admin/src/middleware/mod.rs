//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Auth extractors in handlers (`RequireStaff`, `RequireEditor`, `RequireAdmin`)

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, OptionalStaff, RequireAdmin, RequireEditor, RequireStaff, clear_current_staff,
    set_current_staff,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};

use axum::http::{HeaderName, HeaderValue, header};
use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};
use tower_http::set_header::SetResponseHeaderLayer;

type HeaderLayer = SetResponseHeaderLayer<HeaderValue>;

/// Response headers set on every response.
///
/// Board pages only load their own scripts and styles.
#[must_use]
pub fn security_headers()
-> ServiceBuilder<Stack<HeaderLayer, Stack<HeaderLayer, Stack<HeaderLayer, Identity>>>> {
    ServiceBuilder::new()
        .layer(header_layer(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(header_layer(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(header_layer(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'",
            ),
        ))
}

fn header_layer(name: HeaderName, value: HeaderValue) -> HeaderLayer {
    SetResponseHeaderLayer::if_not_present(name, value)
}
