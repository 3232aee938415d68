//! Server-Sent Events for live boards.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Router,
    extract::{Query, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use liveshop_core::LivePhaseId;

use crate::middleware::RequireStaff;
use crate::services::ChangeEvent;
use crate::state::AppState;

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(events))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub phase_id: Option<LivePhaseId>,
}

/// Serialize a change as an SSE event named after its table.
fn to_sse(event: &ChangeEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_else(|_| {
        r#"{"error":"Failed to serialize event"}"#.to_string()
    });
    Event::default().event(event.table).data(json)
}

/// GET /api/events?phase_id=..
///
/// Streams change events, optionally only those of one phase. A client that
/// falls behind gets a `lagged` event and should re-query everything.
pub async fn events(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.changes().subscribe();
    let phase = query.phase_id;

    let sse_stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(event) if event.visible_to(phase) => yield Ok(to_sse(&event)),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event subscriber lagged");
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

