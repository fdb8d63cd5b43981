//! # Lumen View
//!
//! Lifecycle coordination for VR/AR views. A view is one logical
//! "display surface + renderer + scene" unit that can move between
//! windowed preview, stereo VR and AR passthrough while the host app goes
//! through its lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! Host lifecycle ──► LifecycleBridge ──┐
//!                                      ▼
//! Host API calls ─────────────► TransitionQueue (lifecycle lane, render lane)
//!                                      │
//!                                      ▼
//!                              transition worker ──► RenderSession ──► Renderer
//!                                      │
//!                                      ▼
//!                       ViewSnapshot (read by accessors) + ViewEvent stream
//! ```
//!
//! ## Example
//!
//! ```
//! use lumen_presenter::NullRenderer;
//! use lumen_view::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let view = ViewCoordinator::new(Arc::new(NullRenderer::new()), ViewConfig::default()).unwrap();
//! let bridge = LifecycleBridge::new(view.clone());
//!
//! bridge.handle(LifecycleEvent::Create).unwrap();
//! bridge.handle(LifecycleEvent::Resume).unwrap();
//!
//! view.set_vr_mode_enabled(true).unwrap();
//! view.wait_idle(Duration::from_secs(5)).unwrap();
//! assert_eq!(view.current_mode(), RenderMode::Vr);
//!
//! bridge.handle(LifecycleEvent::Destroy).unwrap();
//! assert_eq!(view.state(), ViewState::Destroyed);
//! ```

pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod saved;
pub mod state;
pub mod validation;

mod queue;

pub use collaborators::{ContentView, MediaRecorder, NullContentView, NullRecorder};
pub use config::ViewConfig;
pub use coordinator::{ViewCoordinator, ViewCoordinatorBuilder};
pub use error::{ConfigError, ViewError, ViewResult};
pub use event::{EventHub, ViewEvent};
pub use lifecycle::{LifecycleBridge, LifecycleEvent};
pub use saved::SavedViewState;
pub use state::{ApiKeyStatus, RenderContext, ViewState, ViewStats};
pub use validation::{ApiKeyValidator, StaticValidator, ValidationOutcome, ValidationReply};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::{
        ApiKeyStatus, LifecycleBridge, LifecycleEvent, SavedViewState, ViewConfig,
        ViewCoordinator, ViewError, ViewEvent, ViewState,
    };
    pub use lumen_presenter::{DebugFlags, Renderer, Scene};
    pub use lumen_xr::{ModeDescriptor, RenderMode};
}
