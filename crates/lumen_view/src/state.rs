//! View state, published snapshot and counters

use crate::error::ViewError;
use lumen_presenter::{DebugFlags, SessionHandle, SessionId};
use lumen_xr::{ModeDescriptor, RenderMode};
use std::fmt;
use std::sync::Arc;

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// No session created yet
    Uninitialized,
    /// Session running
    Active,
    /// Session parked (host paused or a transition failed)
    Suspended,
    /// Mode or hardware change in progress
    ModeTransitioning,
    /// Terminal
    Destroyed,
}

impl ViewState {
    /// Check if renderer-facing accessors are available
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::ModeTransitioning => "mode-transitioning",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// License key validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiKeyStatus {
    #[default]
    Unvalidated,
    Pending,
    Valid,
    Rejected,
}

impl ApiKeyStatus {
    /// Whether scene geometry may reach the renderer
    pub fn allows_submission(&self) -> bool {
        matches!(self, Self::Unvalidated | Self::Valid)
    }
}

/// Non-owning view of the active render session
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub session: SessionId,
    pub handle: SessionHandle,
    pub mode: RenderMode,
    pub descriptor: Arc<ModeDescriptor>,
}

/// Everything readers see, replaced under one write lock
#[derive(Debug, Clone)]
pub(crate) struct ViewSnapshot {
    pub state: ViewState,
    pub descriptor: Arc<ModeDescriptor>,
    /// Mode of the live session, or the mode the next session will use
    pub mode: RenderMode,
    /// VR as requested by the host
    pub vr_requested: bool,
    pub api_status: ApiKeyStatus,
    pub debug: DebugFlags,
    pub context: Option<RenderContext>,
    pub last_error: Option<ViewError>,
}

/// Coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewStats {
    /// Render sessions created
    pub sessions_created: u64,
    /// Render sessions destroyed
    pub sessions_destroyed: u64,
    /// Sessions kept across a transition
    pub sessions_reused: u64,
    /// Transitions that reached Active
    pub transitions_completed: u64,
    /// Transitions that fell back to Suspended
    pub transitions_failed: u64,
    /// Requests dispatched to the key validator
    pub validations_dispatched: u64,
    /// Scene bindings applied
    pub scenes_bound: u64,
}
