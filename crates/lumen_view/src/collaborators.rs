//! Host-side collaborators the coordinator hands out or notifies

use lumen_xr::SurfaceKind;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Platform widget that hosts the render surface
pub trait ContentView: Send + Sync {
    /// A session now renders into a surface of this kind
    fn surface_changed(&self, _surface: SurfaceKind) {}

    /// The view was destroyed; the surface is gone
    fn detached(&self) {}
}

/// Screen or video capture attached to a view
pub trait MediaRecorder: Send + Sync {
    fn is_recording(&self) -> bool;

    /// Stop any capture in progress
    fn stop(&self);
}

/// Content view that only remembers the last surface it saw
#[derive(Default)]
pub struct NullContentView {
    surface: Mutex<Option<SurfaceKind>>,
}

impl NullContentView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current surface, `None` before the first session or after detach
    pub fn surface(&self) -> Option<SurfaceKind> {
        *self.surface.lock()
    }
}

impl ContentView for NullContentView {
    fn surface_changed(&self, surface: SurfaceKind) {
        *self.surface.lock() = Some(surface);
    }

    fn detached(&self) {
        *self.surface.lock() = None;
    }
}

/// Recorder that never captures anything
#[derive(Default)]
pub struct NullRecorder {
    recording: AtomicBool,
}

impl NullRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a capture started
    pub fn start(&self) {
        self.recording.store(true, Ordering::Release);
    }
}

impl MediaRecorder for NullRecorder {
    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.recording.store(false, Ordering::Release);
    }
}
