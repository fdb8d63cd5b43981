//! Host lifecycle bridge
//!
//! Translates host application lifecycle callbacks into coordinator
//! transitions. Events are handled one at a time: a second event waits
//! until the first one's transition has been acknowledged.

use crate::coordinator::ViewCoordinator;
use crate::error::ViewResult;
use crate::saved::SavedViewState;
use crate::state::ViewState;
use parking_lot::Mutex;
use std::fmt;

/// Host application lifecycle callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    SaveInstanceState,
    Destroy,
    /// The host process is being killed without a regular Destroy
    ProcessDeath,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Default)]
struct BridgeState {
    started: bool,
    /// Applied on Create
    restore: Option<SavedViewState>,
    /// Captured on SaveInstanceState
    saved: Option<SavedViewState>,
    last_event: Option<LifecycleEvent>,
}

/// Feeds host lifecycle events into one [`ViewCoordinator`]
pub struct LifecycleBridge {
    coordinator: ViewCoordinator,
    state: Mutex<BridgeState>,
}

impl LifecycleBridge {
    pub fn new(coordinator: ViewCoordinator) -> Self {
        Self {
            coordinator,
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// Configuration to restore when the view is created, typically read
    /// back from the host's saved-instance bundle after process death
    pub fn with_saved_state(self, saved: SavedViewState) -> Self {
        self.state.lock().restore = Some(saved);
        self
    }

    pub fn coordinator(&self) -> &ViewCoordinator {
        &self.coordinator
    }

    /// Handle one lifecycle event. Pause and Stop return only after the
    /// render session stopped drawing.
    pub fn handle(&self, event: LifecycleEvent) -> ViewResult<()> {
        let mut state = self.state.lock();

        if self.coordinator.is_destroyed() {
            if !matches!(event, LifecycleEvent::Destroy | LifecycleEvent::ProcessDeath) {
                log::info!("Ignoring {} after destroy", event);
            }
            return Ok(());
        }

        log::debug!("Lifecycle event {} (previous {:?})", event, state.last_event);
        state.last_event = Some(event);

        match event {
            LifecycleEvent::Create => {
                if self.coordinator.state() != ViewState::Uninitialized {
                    log::debug!("View already created");
                    return Ok(());
                }
                if let Some(saved) = state.restore.take() {
                    log::info!("Restoring saved view state ({})", saved.descriptor);
                    self.coordinator.restore_state(&saved)?;
                }
                self.coordinator.init()
            }
            LifecycleEvent::Start => {
                state.started = true;
                Ok(())
            }
            LifecycleEvent::Resume => self.coordinator.host_resume(),
            LifecycleEvent::Pause => self.coordinator.host_pause(),
            LifecycleEvent::Stop => {
                state.started = false;
                self.coordinator.host_pause()
            }
            LifecycleEvent::SaveInstanceState => {
                state.saved = Some(self.coordinator.save_state()?);
                Ok(())
            }
            LifecycleEvent::Destroy => {
                self.coordinator.destroy();
                Ok(())
            }
            LifecycleEvent::ProcessDeath => {
                log::warn!("Host process dying, tearing down view");
                self.coordinator.destroy();
                Ok(())
            }
        }
    }

    /// State captured by the last SaveInstanceState
    pub fn saved_state(&self) -> Option<SavedViewState> {
        self.state.lock().saved.clone()
    }

    /// Between Start and Stop
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }
}
