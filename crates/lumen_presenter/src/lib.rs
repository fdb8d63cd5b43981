//! # Lumen Presenter
//!
//! Render session layer for Lumen views:
//! - The [`Renderer`] contract implemented by native GPU backends
//! - [`RenderSession`]: one renderer session plus its render thread
//! - Frame pacing and scene submission gating
//! - Rehydration state carried across session rebuilds
//!
//! ## Architecture
//!
//! ```text
//! View Coordinator ──► RenderSession ──► Renderer (GPU context)
//!                           │
//!                           ▼
//!                      RenderLoop thread ──► draw_frame(FrameRequest)
//!                           ▲
//!                           │
//!                      SceneSlot (binding + submission gate)
//! ```
//!
//! ## Key Concepts
//!
//! - **Session**: a live GPU context bound to one render mode
//! - **Render loop**: the per-session thread; pausing it is synchronous
//! - **Scene slot**: what the loop submits each frame, swapped atomically
//! - **Rehydration**: state handed from a destroyed session to its successor

pub mod frame;
pub mod rehydration;
pub mod render_loop;
pub mod session;
pub mod timing;

pub use frame::{FrameRequest, Scene, SceneSlot};
pub use rehydration::{
    Rehydratable, RehydrationError, RehydrationState, RehydrationValue, StoredValue,
};
pub use render_loop::{FrameDriver, RenderLoop};
pub use session::{RenderSession, SessionState};
pub use timing::FrameTiming;

use lumen_xr::{ModeDescriptor, RenderMode, SurfaceKind};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Renderer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Context lost: {0}")]
    ContextLost(String),
}

/// Opaque handle issued by a [`Renderer`] for one GPU session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Process-unique render session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new unique session ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Debug overlays applied to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugFlags {
    /// Renderer debug output (validation, logging)
    pub debug_enabled: bool,
    /// On-screen HUD with frame statistics
    pub hud_enabled: bool,
}

impl DebugFlags {
    pub fn new(debug_enabled: bool, hud_enabled: bool) -> Self {
        Self { debug_enabled, hud_enabled }
    }
}

/// Parameters for creating a GPU session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Render mode of the session
    pub mode: RenderMode,
    /// Hardware the session renders to
    pub descriptor: Arc<ModeDescriptor>,
    /// Debug overlays to apply at creation
    pub debug: DebugFlags,
    /// Target frame rate of the render loop (0 = unpaced)
    pub target_fps: u32,
}

impl SessionRequest {
    /// Create a request with default pacing
    pub fn new(mode: RenderMode, descriptor: Arc<ModeDescriptor>) -> Self {
        Self {
            mode,
            descriptor,
            debug: DebugFlags::default(),
            target_fps: 60,
        }
    }

    /// Set debug flags
    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    /// Set target frame rate
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Surface kind the session needs
    pub fn surface(&self) -> SurfaceKind {
        self.mode.surface_kind()
    }
}

/// The renderer contract - implemented by native GPU backends.
///
/// Calls for one handle never overlap except `draw_frame`, which runs on the
/// session's render thread while the session is running.
pub trait Renderer: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Create a GPU context and surface for a mode
    fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle, RendererError>;

    /// Stop GPU work, keeping resources
    fn suspend(&self, handle: SessionHandle) -> Result<(), RendererError>;

    /// Restart GPU work after [`Renderer::suspend`]
    fn resume(&self, handle: SessionHandle) -> Result<(), RendererError>;

    /// Release the context and all its resources
    fn destroy(&self, handle: SessionHandle) -> Result<(), RendererError>;

    /// Apply debug overlays
    fn set_debug_flags(&self, handle: SessionHandle, flags: DebugFlags) -> Result<(), RendererError>;

    /// Reset head tracking orientation
    fn recenter(&self, handle: SessionHandle) -> Result<(), RendererError>;

    /// Render one frame
    fn draw_frame(&self, handle: SessionHandle, frame: &FrameRequest) -> Result<(), RendererError>;
}

/// Null renderer for testing and headless hosts
#[derive(Default)]
pub struct NullRenderer {
    next_handle: AtomicU64,
    live: Mutex<HashSet<SessionHandle>>,
    frames: AtomicU64,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions not yet destroyed
    pub fn live_sessions(&self) -> usize {
        self.live.lock().len()
    }

    /// Total frames drawn across all sessions
    pub fn frames_drawn(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn check(&self, handle: SessionHandle) -> Result<(), RendererError> {
        if self.live.lock().contains(&handle) {
            Ok(())
        } else {
            Err(RendererError::ContextLost(format!("unknown handle {}", handle.raw())))
        }
    }
}

impl Renderer for NullRenderer {
    fn name(&self) -> &str {
        "null"
    }

    fn create_session(&self, _request: &SessionRequest) -> Result<SessionHandle, RendererError> {
        let handle = SessionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.live.lock().insert(handle);
        Ok(handle)
    }

    fn suspend(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check(handle)
    }

    fn resume(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check(handle)
    }

    fn destroy(&self, handle: SessionHandle) -> Result<(), RendererError> {
        if self.live.lock().remove(&handle) {
            Ok(())
        } else {
            Err(RendererError::ContextLost(format!("unknown handle {}", handle.raw())))
        }
    }

    fn set_debug_flags(&self, handle: SessionHandle, _flags: DebugFlags) -> Result<(), RendererError> {
        self.check(handle)
    }

    fn recenter(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check(handle)
    }

    fn draw_frame(&self, handle: SessionHandle, _frame: &FrameRequest) -> Result<(), RendererError> {
        self.check(handle)?;
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_renderer_sessions() {
        let renderer = NullRenderer::new();
        let request = SessionRequest::new(RenderMode::Vr, Arc::new(ModeDescriptor::default()));

        let a = renderer.create_session(&request).unwrap();
        let b = renderer.create_session(&request).unwrap();
        assert_ne!(a, b);
        assert_eq!(renderer.live_sessions(), 2);

        renderer.destroy(a).unwrap();
        assert_eq!(renderer.live_sessions(), 1);
        assert!(renderer.suspend(a).is_err());
        assert!(renderer.suspend(b).is_ok());
    }

    #[test]
    fn test_session_request() {
        let request = SessionRequest::new(RenderMode::Vr, Arc::new(ModeDescriptor::default()))
            .with_debug(DebugFlags::new(true, false))
            .with_target_fps(90);

        assert_eq!(request.surface(), SurfaceKind::Stereo);
        assert!(request.debug.debug_enabled);
        assert_eq!(request.target_fps, 90);
    }

    #[test]
    fn test_session_ids_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }
}
