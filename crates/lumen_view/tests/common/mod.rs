//! Instrumented collaborators shared by the integration tests

#![allow(dead_code)]

use lumen_presenter::{
    DebugFlags, FrameRequest, Renderer, RendererError, Scene, SessionHandle, SessionRequest,
};
use lumen_view::{
    ApiKeyValidator, ContentView, ValidationOutcome, ValidationReply, ViewConfig,
    ViewCoordinator, ViewState,
};
use lumen_xr::{RenderMode, SurfaceKind};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

pub struct TestScene(pub &'static str);

impl Scene for TestScene {
    fn name(&self) -> &str {
        self.0
    }
}

pub fn scene(name: &'static str) -> Arc<dyn Scene> {
    Arc::new(TestScene(name))
}

#[derive(Default)]
struct Handles {
    live: HashSet<SessionHandle>,
    suspended: HashSet<SessionHandle>,
    modes: HashMap<SessionHandle, RenderMode>,
    /// Draws that must never happen: suspended or destroyed handle
    violations: Vec<String>,
}

/// Renderer that records every call and flags draws on parked sessions
#[derive(Default)]
pub struct MockRenderer {
    next_handle: AtomicU64,
    handles: Mutex<Handles>,
    pub creates: AtomicUsize,
    pub destroys: AtomicUsize,
    pub suspends: AtomicUsize,
    pub resumes: AtomicUsize,
    pub recenters: AtomicUsize,
    pub debug_calls: Mutex<Vec<DebugFlags>>,
    pub frames: AtomicU64,
    pub frames_with_scene: AtomicU64,
    /// Upcoming create_session calls that fail
    pub fail_creates: AtomicUsize,
    /// Delay inside create_session, to hold a transition open
    pub create_delay: Mutex<Duration>,
    /// Handles whose next draw reports a lost context
    pub lose: Mutex<HashSet<SessionHandle>>,
    /// View whose state is read at every draw
    watched: Mutex<Option<ViewCoordinator>>,
    pub suspended_draws: AtomicU64,
}

impl MockRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn violations(&self) -> Vec<String> {
        self.handles.lock().violations.clone()
    }

    pub fn live_sessions(&self) -> usize {
        self.handles.lock().live.len()
    }

    pub fn created(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn frames_with_scene(&self) -> u64 {
        self.frames_with_scene.load(Ordering::SeqCst)
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock() = delay;
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.fail_creates.store(count, Ordering::SeqCst);
    }

    pub fn lose_context(&self, handle: SessionHandle) {
        self.lose.lock().insert(handle);
    }

    /// Check the view's published state inside every draw. The renderer
    /// keeps the view alive, so tests must destroy it explicitly.
    pub fn watch(&self, view: &ViewCoordinator) {
        *self.watched.lock() = Some(view.clone());
    }

    /// Frames drawn while the watched view reported Suspended
    pub fn suspended_draws(&self) -> u64 {
        self.suspended_draws.load(Ordering::SeqCst)
    }

    pub fn mode_of(&self, handle: SessionHandle) -> Option<RenderMode> {
        self.handles.lock().modes.get(&handle).copied()
    }

    fn check_live(&self, handle: SessionHandle) -> Result<(), RendererError> {
        if self.handles.lock().live.contains(&handle) {
            Ok(())
        } else {
            Err(RendererError::ContextLost(format!("handle {} released", handle.raw())))
        }
    }
}

impl Renderer for MockRenderer {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle, RendererError> {
        let delay = *self.create_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let failing = self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RendererError::DeviceUnavailable("injected failure".into()));
        }

        let handle = SessionHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        let mut handles = self.handles.lock();
        handles.live.insert(handle);
        handles.modes.insert(handle, request.mode);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn suspend(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check_live(handle)?;
        self.handles.lock().suspended.insert(handle);
        self.suspends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check_live(handle)?;
        self.handles.lock().suspended.remove(&handle);
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self, handle: SessionHandle) -> Result<(), RendererError> {
        let mut handles = self.handles.lock();
        handles.suspended.remove(&handle);
        if !handles.live.remove(&handle) {
            return Err(RendererError::ContextLost(format!("handle {} released twice", handle.raw())));
        }
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_debug_flags(&self, handle: SessionHandle, flags: DebugFlags) -> Result<(), RendererError> {
        self.check_live(handle)?;
        self.debug_calls.lock().push(flags);
        Ok(())
    }

    fn recenter(&self, handle: SessionHandle) -> Result<(), RendererError> {
        self.check_live(handle)?;
        self.recenters.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn draw_frame(&self, handle: SessionHandle, frame: &FrameRequest) -> Result<(), RendererError> {
        let watched = self.watched.lock().clone();
        if watched.map(|view| view.state()) == Some(ViewState::Suspended) {
            self.suspended_draws.fetch_add(1, Ordering::SeqCst);
            self.handles
                .lock()
                .violations
                .push(format!("frame {} drawn while the view was suspended", frame.number()));
        }

        {
            let mut handles = self.handles.lock();
            if !handles.live.contains(&handle) {
                handles.violations.push(format!("frame {} on released handle {}", frame.number(), handle.raw()));
                return Err(RendererError::ContextLost("released".into()));
            }
            if handles.suspended.contains(&handle) {
                handles.violations.push(format!("frame {} on suspended handle {}", frame.number(), handle.raw()));
            }
        }

        if self.lose.lock().remove(&handle) {
            return Err(RendererError::ContextLost("injected loss".into()));
        }

        self.frames.fetch_add(1, Ordering::SeqCst);
        if frame.submits_scene() {
            self.frames_with_scene.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Validator that parks requests until the test answers them
#[derive(Default)]
pub struct ManualValidator {
    pending: Mutex<Vec<(String, ValidationReply)>>,
    pub dispatched: AtomicUsize,
}

impl ManualValidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Answer the oldest pending request; returns its key
    pub fn answer(&self, outcome: ValidationOutcome) -> Option<String> {
        let next = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };
        next.map(|(key, reply)| {
            reply.complete(outcome);
            key
        })
    }
}

impl ApiKeyValidator for ManualValidator {
    fn validate(&self, key: String, reply: ValidationReply) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push((key, reply));
    }
}

/// Content view that stalls on every surface change
pub struct SlowContentView(pub Duration);

impl ContentView for SlowContentView {
    fn surface_changed(&self, _surface: SurfaceKind) {
        thread::sleep(self.0);
    }
}

pub fn fast_config() -> ViewConfig {
    ViewConfig {
        target_fps: 240,
        ..ViewConfig::default()
    }
}

/// Coordinator on the mock renderer, already initialized
pub fn active_view(renderer: &Arc<MockRenderer>) -> ViewCoordinator {
    let view = ViewCoordinator::new(renderer.clone(), fast_config()).unwrap();
    view.init().unwrap();
    view
}
