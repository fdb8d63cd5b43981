//! Render session
//!
//! A [`RenderSession`] pairs one renderer handle with the render loop that
//! drives it. It is the unit that gets suspended, reused, or rebuilt when a
//! view changes mode.
//!
//! Creating or resuming a session leaves the render loop parked in
//! [`SessionState::Ready`]; frames only flow after [`RenderSession::start`].
//! The owner publishes its own state first, then starts the session.

use crate::frame::{FrameRequest, SceneSlot};
use crate::rehydration::RehydrationState;
use crate::render_loop::RenderLoop;
use crate::{DebugFlags, Renderer, RendererError, SessionHandle, SessionId, SessionRequest};
use lumen_xr::{ModeDescriptor, RenderMode, SurfaceKind};
use std::sync::Arc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// GPU context live, render loop parked until started
    Ready,
    /// Render loop is drawing
    Running,
    /// GPU work stopped, resources kept
    Suspended,
    /// Handle destroyed
    Released,
}

/// One live GPU context plus its render thread
pub struct RenderSession {
    id: SessionId,
    handle: SessionHandle,
    mode: RenderMode,
    descriptor: Arc<ModeDescriptor>,
    renderer: Arc<dyn Renderer>,
    render_loop: RenderLoop,
    state: SessionState,
    /// Flags last pushed to the renderer
    debug: DebugFlags,
}

impl RenderSession {
    /// Create the GPU session with its render loop parked.
    ///
    /// `resume_from` is the state of a predecessor session; frame numbering
    /// continues from it.
    pub fn create(
        renderer: Arc<dyn Renderer>,
        request: &SessionRequest,
        scenes: Arc<SceneSlot>,
        resume_from: Option<&RehydrationState>,
    ) -> Result<Self, RendererError> {
        let id = SessionId::new();
        let handle = renderer.create_session(request)?;

        if request.debug != DebugFlags::default() {
            if let Err(e) = renderer.set_debug_flags(handle, request.debug) {
                release_handle(renderer.as_ref(), handle);
                return Err(e);
            }
        }

        let first_frame = resume_from
            .and_then(|state| state.get_value::<u64>("frame_number"))
            .unwrap_or(0);

        let mode = request.mode;
        let draw_renderer = renderer.clone();
        let driver = Box::new(move |number: u64| {
            let frame = FrameRequest::new(number, mode, scenes.frame_scene());
            draw_renderer.draw_frame(handle, &frame)
        });

        let render_loop = match RenderLoop::spawn(
            format!("lumen-render-{}", id.raw()),
            first_frame,
            request.target_fps,
            driver,
        ) {
            Ok(render_loop) => render_loop,
            Err(e) => {
                release_handle(renderer.as_ref(), handle);
                return Err(e);
            }
        };

        log::info!(
            "Created {} ({} on {}, handle {})",
            id,
            mode,
            request.descriptor,
            handle.raw()
        );

        Ok(Self {
            id,
            handle,
            mode,
            descriptor: request.descriptor.clone(),
            renderer,
            render_loop,
            state: SessionState::Ready,
            debug: request.debug,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn surface(&self) -> SurfaceKind {
        self.mode.surface_kind()
    }

    pub fn descriptor(&self) -> &Arc<ModeDescriptor> {
        &self.descriptor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    /// Frames drawn by this session's loop
    pub fn frames_drawn(&self) -> u64 {
        self.render_loop.frames_drawn()
    }

    /// Check if the render loop parked on a lost context
    pub fn is_context_lost(&self) -> bool {
        self.render_loop.lost().is_some()
    }

    /// Let the render loop draw
    pub fn start(&mut self) {
        if self.state != SessionState::Ready {
            return;
        }

        self.state = SessionState::Running;
        self.render_loop.resume();
        log::debug!("Started {}", self.id);
    }

    /// Stop GPU work. The render loop is parked before the renderer is told,
    /// so no frame runs once this returns.
    pub fn suspend(&mut self) -> Result<(), RendererError> {
        if !matches!(self.state, SessionState::Ready | SessionState::Running) {
            return Ok(());
        }

        self.render_loop.pause();
        self.state = SessionState::Suspended;
        self.renderer.suspend(self.handle)?;

        log::debug!("Suspended {}", self.id);
        Ok(())
    }

    /// Resume the GPU context. The loop stays parked until [`Self::start`].
    pub fn resume(&mut self) -> Result<(), RendererError> {
        if self.state != SessionState::Suspended {
            return Ok(());
        }

        if let Some(lost) = self.render_loop.lost() {
            return Err(lost);
        }

        self.renderer.resume(self.handle)?;
        self.state = SessionState::Ready;

        log::debug!("Resumed {}", self.id);
        Ok(())
    }

    /// Point a reused session at new hardware identity
    pub fn rebind_descriptor(&mut self, descriptor: Arc<ModeDescriptor>) {
        log::debug!("{} now renders for {}", self.id, descriptor);
        self.descriptor = descriptor;
    }

    /// Push debug flags if they changed
    pub fn set_debug_flags(&mut self, flags: DebugFlags) -> Result<(), RendererError> {
        if flags == self.debug || self.state == SessionState::Released {
            return Ok(());
        }

        self.renderer.set_debug_flags(self.handle, flags)?;
        self.debug = flags;
        Ok(())
    }

    /// Reset head tracking orientation
    pub fn recenter(&self) -> Result<(), RendererError> {
        self.renderer.recenter(self.handle)
    }

    /// State handed to a successor session
    pub fn rehydration_state(&self) -> RehydrationState {
        RehydrationState::new()
            .with_value("frame_number", self.render_loop.next_frame_number())
            .with_value("mode", self.mode.as_str().to_string())
            .with_value("debug", self.debug.debug_enabled)
            .with_value("hud", self.debug.hud_enabled)
    }

    /// Stop the render loop and release the GPU context
    pub fn destroy(mut self) -> Result<(), RendererError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), RendererError> {
        if self.state == SessionState::Released {
            return Ok(());
        }

        self.render_loop.stop();
        self.state = SessionState::Released;
        let result = self.renderer.destroy(self.handle);

        log::info!("Destroyed {} (handle {})", self.id, self.handle.raw());
        result
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release {}: {}", self.id, e);
        }
    }
}

fn release_handle(renderer: &dyn Renderer, handle: SessionHandle) {
    if let Err(e) = renderer.destroy(handle) {
        log::warn!("Failed to release handle {} after setup error: {}", handle.raw(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullRenderer;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn request(mode: RenderMode) -> SessionRequest {
        SessionRequest::new(mode, Arc::new(ModeDescriptor::default())).with_target_fps(500)
    }

    #[test]
    fn test_session_lifecycle() {
        let renderer = Arc::new(NullRenderer::new());
        let mut session = RenderSession::create(
            renderer.clone(),
            &request(RenderMode::Vr),
            Arc::new(SceneSlot::new()),
            None,
        )
        .unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.surface(), SurfaceKind::Stereo);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(session.frames_drawn(), 0);

        session.start();
        assert_eq!(session.state(), SessionState::Running);
        assert!(wait_until(|| session.frames_drawn() > 0));

        session.suspend().unwrap();
        assert_eq!(session.state(), SessionState::Suspended);
        let drawn = session.frames_drawn();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(session.frames_drawn(), drawn);

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(session.frames_drawn(), drawn);

        session.start();
        assert!(wait_until(|| session.frames_drawn() > drawn));

        session.destroy().unwrap();
        assert_eq!(renderer.live_sessions(), 0);
    }

    #[test]
    fn test_drop_releases_handle() {
        let renderer = Arc::new(NullRenderer::new());
        {
            let _session = RenderSession::create(
                renderer.clone(),
                &request(RenderMode::Windowed),
                Arc::new(SceneSlot::new()),
                None,
            )
            .unwrap();
            assert_eq!(renderer.live_sessions(), 1);
        }
        assert_eq!(renderer.live_sessions(), 0);
    }

    #[test]
    fn test_rehydration_continues_frames() {
        let renderer = Arc::new(NullRenderer::new());
        let slot = Arc::new(SceneSlot::new());

        let mut first = RenderSession::create(renderer.clone(), &request(RenderMode::Windowed), slot.clone(), None).unwrap();
        first.start();
        assert!(wait_until(|| first.frames_drawn() >= 3));
        let state = first.rehydration_state();
        first.destroy().unwrap();

        let carried = state.get_value::<u64>("frame_number").unwrap();
        assert!(carried >= 3);

        let second = RenderSession::create(renderer.clone(), &request(RenderMode::Vr), slot, Some(&state)).unwrap();
        assert!(second.rehydration_state().get_value::<u64>("frame_number").unwrap() >= carried);
    }

    #[test]
    fn test_debug_flags_only_pushed_on_change() {
        let renderer = Arc::new(NullRenderer::new());
        let mut session = RenderSession::create(
            renderer,
            &request(RenderMode::Windowed).with_debug(DebugFlags::new(true, false)),
            Arc::new(SceneSlot::new()),
            None,
        )
        .unwrap();

        assert_eq!(session.debug_flags(), DebugFlags::new(true, false));
        session.set_debug_flags(DebugFlags::new(true, true)).unwrap();
        assert!(session.debug_flags().hud_enabled);
    }
}
