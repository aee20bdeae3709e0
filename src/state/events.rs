use tokio::sync::broadcast;

use crate::{engine::SpinOutcome, state::spin_machine::SessionId};

/// Notifications fanned out to whoever renders the application.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The group collection changed in memory.
    GroupsChanged {
        /// Store revision after the change.
        revision: u64,
        /// Whether storage caught up with this revision.
        durable: bool,
    },
    /// The currently selected group changed (or was cleared).
    SelectionChanged {
        /// Newly selected group.
        group: Option<String>,
    },
    /// A spin session started.
    SpinStarted {
        /// Session identifier.
        session_id: SessionId,
        /// Group being spun.
        group: String,
        /// Number of sectors on the wheel.
        option_count: usize,
    },
    /// The winner of a session is revealed.
    Revealed(SpinOutcome),
    /// The user stopped a spin before the reveal.
    SpinCancelled {
        /// Session identifier.
        session_id: SessionId,
    },
    /// A spin session ended on an error.
    SpinFailed {
        /// Session identifier.
        session_id: SessionId,
        /// Human-readable failure cause.
        reason: String,
    },
    /// The reveal delay elapsed and the engine is idle again.
    SpinFinished {
        /// Session identifier.
        session_id: SessionId,
    },
}

/// Simple broadcast hub for [`AppEvent`]s.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<AppEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: AppEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
