//! HTTP route handlers for the back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready         - Liveness and readiness (see lib.rs)
//!
//! # Pages
//! GET  /                              - Recent live sessions
//! GET  /login, POST /login            - Staff login form
//! POST /logout                        - Logout
//! GET  /phases/{id}/board             - Live board of a phase
//!
//! # JSON API (see api/)
//! /api/auth/*                         - Login, logout, current staff
//! /api/customers[/{id}[/status]]      - Customers
//! /api/live-sessions[/{id}]           - Sessions with generated phases
//! /api/live-phases/{id}/...           - Video, summary, products, orders,
//!                                       comments, sync, reconcile
//! /api/live-products/{id}[/prepared|/oversell/recompute]
//! /api/live-orders/{id}[/quantity|/sync]
//! /api/purchase-orders[/{id}/...]     - Supplier orders and receiving
//! /api/facebook/videos                - Page videos
//! GET  /api/events                    - Server-Sent change events
//!
//! # Webhooks
//! GET|POST /webhooks/facebook         - Page feed subscription
//! ```

pub mod api;
pub mod auth;
pub mod board;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build every route of the back-office.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(board::router())
        .merge(api::router())
        .merge(webhooks::router())
}
