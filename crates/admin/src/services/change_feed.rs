//! In-process change feed.
//!
//! Handlers publish a `ChangeEvent` after every committed write. Board pages
//! subscribe through `GET /api/events` and re-query when something they show
//! changed. A receiver that falls behind skips the events it missed.

use serde::Serialize;
use tokio::sync::broadcast;

use liveshop_core::LivePhaseId;

/// Buffered events per receiver before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Kind of write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A committed change to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Table name without schema (`live_order`, `live_product`, ...).
    pub table: &'static str,
    pub action: ChangeAction,
    pub id: i32,
    /// Phase the row belongs to, for phase-scoped subscribers.
    pub phase_id: Option<LivePhaseId>,
}

impl ChangeEvent {
    #[must_use]
    pub const fn new(table: &'static str, action: ChangeAction, id: i32) -> Self {
        Self {
            table,
            action,
            id,
            phase_id: None,
        }
    }

    #[must_use]
    pub const fn in_phase(mut self, phase_id: LivePhaseId) -> Self {
        self.phase_id = Some(phase_id);
        self
    }

    /// Whether a subscriber filtering on `phase` should see this event.
    ///
    /// Events without a phase (customers, purchasing) reach every subscriber.
    #[must_use]
    pub fn visible_to(&self, phase: Option<LivePhaseId>) -> bool {
        match (phase, self.phase_id) {
            (Some(wanted), Some(own)) => wanted == own,
            _ => true,
        }
    }
}

/// Broadcast channel shared through `AppState`.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(
            table = event.table,
            action = ?event.action,
            id = event.id,
            receivers,
            "Change published"
        );
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe();

        let event = ChangeEvent::new("live_order", ChangeAction::Insert, 7).in_phase(LivePhaseId::new(3));
        feed.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::default();
        feed.publish(ChangeEvent::new("customer", ChangeAction::Update, 1));
    }

    #[test]
    fn test_phase_visibility() {
        let phase_3 = LivePhaseId::new(3);
        let phase_4 = LivePhaseId::new(4);
        let order = ChangeEvent::new("live_order", ChangeAction::Insert, 1).in_phase(phase_3);
        let customer = ChangeEvent::new("customer", ChangeAction::Update, 2);

        assert!(order.visible_to(None));
        assert!(order.visible_to(Some(phase_3)));
        assert!(!order.visible_to(Some(phase_4)));
        assert!(customer.visible_to(Some(phase_4)));
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let event = ChangeEvent::new("live_product", ChangeAction::Delete, 5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "delete");
        assert_eq!(json["table"], "live_product");
        assert!(json["phase_id"].is_null());
    }
}
