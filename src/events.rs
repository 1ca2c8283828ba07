//! Outbound "pipeline status changed" notifications.
//!
//! Emitted on a [`tokio::sync::broadcast`] channel so that webhook or chat
//! dispatchers can subscribe without coupling to the engine. Payloads carry
//! identifiers and statuses only, never job details.

use log::debug;
use tokio::sync::broadcast;

use crate::error::{CIStatusError, Result};
use crate::pipeline::StatusChange;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<StatusChange>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CIStatusError::Config(
                "event capacity must be greater than zero".into(),
            ));
        }
        let (sender, _) = broadcast::channel(capacity);
        Ok(Self { sender })
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is dropped.
    pub fn emit(&self, change: StatusChange) {
        if self.sender.send(change).is_err() {
            debug!(
                "No subscribers for status change of pipeline {}",
                change.pipeline_id
            );
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self { sender }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    fn change(pipeline_id: u64, old_status: Status, new_status: Status) -> StatusChange {
        StatusChange {
            pipeline_id,
            old_status,
            new_status,
        }
    }

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16).unwrap();
        let mut rx = emitter.subscribe();

        emitter.emit(change(7, Status::Pending, Status::Running));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.pipeline_id, 7);
        assert_eq!(event.old_status, Status::Pending);
        assert_eq!(event.new_status, Status::Running);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let emitter = EventEmitter::default();
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();

        emitter.emit(change(1, Status::Running, Status::Success));

        assert_eq!(first.recv().await.unwrap(), second.recv().await.unwrap());
    }

    #[test]
    fn emit_without_subscribers_is_dropped() {
        let emitter = EventEmitter::default();
        emitter.emit(change(1, Status::Running, Status::Failed));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            EventEmitter::new(0),
            Err(CIStatusError::Config(_))
        ));
    }
}
