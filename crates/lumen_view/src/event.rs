//! View events
//!
//! Transitions complete on the coordinator's worker thread; hosts observe
//! them through [`ViewEvent`] streams handed out by [`EventHub::subscribe`].

use crate::error::ViewError;
use crate::state::{ApiKeyStatus, ViewState};
use crossbeam_channel::{unbounded, Receiver, Sender};
use lumen_presenter::SessionId;
use lumen_xr::{ModeDescriptor, RenderMode};
use parking_lot::Mutex;
use std::sync::Arc;

/// Something observable happened to a view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    StateChanged {
        from: ViewState,
        to: ViewState,
    },
    /// A transition settled on a new mode or descriptor
    ModeChanged {
        mode: RenderMode,
        descriptor: Arc<ModeDescriptor>,
        session: SessionId,
    },
    /// A transition failed; the view is Suspended without a session
    ModeTransitionFailed {
        error: ViewError,
    },
    /// A scene was bound; `session` is `None` before the first session exists
    SceneBound {
        session: Option<SessionId>,
    },
    ValidationCompleted {
        status: ApiKeyStatus,
    },
}

/// Fan-out of events to subscribers
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<ViewEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new event stream
    pub fn subscribe(&self) -> Receiver<ViewEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned
    pub fn emit(&self, event: ViewEvent) {
        log::trace!("View event: {:?}", event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.emit(ViewEvent::ValidationCompleted { status: ApiKeyStatus::Valid });

        assert_eq!(a.try_recv().unwrap(), ViewEvent::ValidationCompleted { status: ApiKeyStatus::Valid });
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscribers_pruned() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        drop(hub.subscribe());

        hub.emit(ViewEvent::StateChanged { from: ViewState::Uninitialized, to: ViewState::Active });

        assert_eq!(hub.subscriber_count(), 1);
        assert!(rx.try_recv().is_ok());
    }
}
