//! Facebook page webhook.
//!
//! New comments on a streaming video drop its cached comments and notify the
//! boards of every phase showing that video.

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use crate::db::LiveSessionRepository;
use crate::error::AppError;
use crate::facebook::webhook::{
    SIGNATURE_HEADER, WebhookPayload, handshake_challenge, verify_signature,
};
use crate::services::{ChangeAction, ChangeEvent};
use crate::state::AppState;

/// Build the webhooks router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/facebook", get(verify).post(receive))
}

#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhooks/facebook
///
/// Echoes `hub.challenge` when the verify token matches; 403 otherwise.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<HandshakeQuery>,
) -> Result<String, AppError> {
    let expected = state
        .config()
        .facebook()
        .and_then(|fb| fb.verify_token.as_ref())
        .ok_or_else(|| AppError::Forbidden("webhook is not configured".to_string()))?;

    handshake_challenge(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        expected.expose_secret(),
    )
    .map(str::to_string)
    .ok_or_else(|| AppError::Forbidden("verification failed".to_string()))
}

/// POST /webhooks/facebook
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let secret = state
        .config()
        .facebook()
        .and_then(|fb| fb.app_secret.as_ref())
        .ok_or_else(|| AppError::Forbidden("webhook is not configured".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing signature".to_string()))?;
    verify_signature(secret.expose_secret(), &body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook delivery");
        AppError::Unauthorized("invalid signature".to_string())
    })?;

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;

    let sessions = LiveSessionRepository::new(state.pool());
    for video_id in payload.commented_videos() {
        if let Ok(facebook) = state.facebook() {
            facebook.invalidate_comments(video_id).await;
        }

        for phase in sessions.phases_for_video(video_id).await? {
            state.changes().publish(
                ChangeEvent::new("facebook_comment", ChangeAction::Insert, phase.id.as_i32())
                    .in_phase(phase.id),
            );
        }
        tracing::debug!(video_id, "New comments on live video");
    }

    Ok("EVENT_RECEIVED")
}
