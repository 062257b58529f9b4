//! Transition lifecycle events.
//!
//! # Invariants
//! - One `ViewChangeEvent` per completed switch; none for no-ops, failures
//!   or interrupted switches.
//! - Publishing never fails, even without subscribers.

use crate::model::row::EntityId;
use crate::model::view_state::{ViewTrigger, ViewType};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Context that survived the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedState {
    pub selection_count: usize,
    pub focused_card_id: Option<EntityId>,
    pub filter_count: usize,
}

/// Emitted after a projection switch completes (`viewchange`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewChangeEvent {
    pub from_view: ViewType,
    pub to_view: ViewType,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub trigger: ViewTrigger,
    pub preserved_state: PreservedState,
}

/// Fan-out of view change events to any number of subscribers.
pub struct ViewEvents {
    sender: broadcast::Sender<ViewChangeEvent>,
}

impl Default for ViewEvents {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ViewEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends `event` to current subscribers; returns how many received it.
    pub fn publish(&self, event: ViewChangeEvent) -> usize {
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!("event=viewchange_publish module=service status=ok receivers={delivered}");
        delivered
    }
}
