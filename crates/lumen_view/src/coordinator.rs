//! View coordinator
//!
//! The coordinator owns one view's render session, scene binding and mode
//! state. Structural work (session creation, mode transitions, host
//! pause/resume) runs on a single transition worker; API calls from the
//! host thread either read the published snapshot or queue a command.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized ──init──► Active ◄──resume/pause──► Suspended
//!                           │                          │
//!                           └──mode/hardware change────┤
//!                                     ▼                │
//!                            ModeTransitioning ──fail──┘
//!                                     │
//!                                  success ──► Active
//!
//! any ──destroy──► Destroyed (terminal)
//! ```
//!
//! Lock order: transition queue, then session, then snapshot.

use crate::collaborators::{ContentView, MediaRecorder, NullContentView, NullRecorder};
use crate::config::ViewConfig;
use crate::error::{ViewError, ViewResult};
use crate::event::{EventHub, ViewEvent};
use crate::queue::{Command, LifecycleStep, RenderCommand, TransitionQueue};
use crate::saved::SavedViewState;
use crate::state::{ApiKeyStatus, RenderContext, ViewSnapshot, ViewState, ViewStats};
use crate::validation::{ApiKeyValidator, StaticValidator, ValidationOutcome, ValidationReply};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use lumen_presenter::{
    DebugFlags, RehydrationState, RenderSession, Renderer, Scene, SceneSlot, SessionRequest,
};
use lumen_xr::{ModeDescriptor, PlatformProfile, ProfileRegistry, RenderMode};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Builder for [`ViewCoordinator`]
pub struct ViewCoordinatorBuilder {
    renderer: Arc<dyn Renderer>,
    config: ViewConfig,
    profiles: ProfileRegistry,
    content_view: Arc<dyn ContentView>,
    recorder: Arc<dyn MediaRecorder>,
    validator: Arc<dyn ApiKeyValidator>,
}

impl ViewCoordinatorBuilder {
    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn content_view(mut self, content_view: Arc<dyn ContentView>) -> Self {
        self.content_view = content_view;
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn MediaRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Key validator. Without one every key is rejected.
    pub fn validator(mut self, validator: Arc<dyn ApiKeyValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Validate the config and start the transition worker
    pub fn build(self) -> ViewResult<ViewCoordinator> {
        self.config.validate()?;

        let descriptor = Arc::new(self.config.descriptor.clone());
        let mode = self
            .profiles
            .profile(self.profiles.resolve(&descriptor))
            .mode_for(self.config.vr_mode);

        let snapshot = ViewSnapshot {
            state: ViewState::Uninitialized,
            descriptor,
            mode,
            vr_requested: self.config.vr_mode,
            api_status: ApiKeyStatus::Unvalidated,
            debug: self.config.debug,
            context: None,
            last_error: None,
        };

        let queue = Arc::new(TransitionQueue::new());
        let inner = Arc::new(Inner {
            config: self.config,
            renderer: self.renderer,
            content_view: self.content_view,
            recorder: self.recorder,
            validator: self.validator,
            profiles: self.profiles,
            queue: queue.clone(),
            session: Mutex::new(SessionSlot::default()),
            snapshot: RwLock::new(snapshot),
            scenes: Arc::new(SceneSlot::new()),
            events: EventHub::new(),
            stats: Mutex::new(ViewStats::default()),
            validation: Mutex::new(ValidationGate::default()),
            destroyed: AtomicBool::new(false),
            worker: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let worker = thread::Builder::new()
            .name("lumen-transition".into())
            .spawn(move || run_worker(queue, weak))
            .map_err(|e| ViewError::DeviceUnavailable(format!("transition worker: {}", e)))?;
        *inner.worker.lock() = Some(worker);

        log::info!(
            "View created for {} using renderer '{}' ({})",
            inner.config.descriptor,
            inner.renderer.name(),
            mode
        );

        Ok(ViewCoordinator { inner })
    }
}

/// Unified control surface of one VR/AR view.
///
/// Cheap to clone; all clones drive the same view. The view is destroyed
/// by [`ViewCoordinator::destroy`] or when the last clone is dropped.
#[derive(Clone)]
pub struct ViewCoordinator {
    inner: Arc<Inner>,
}

impl ViewCoordinator {
    /// Start building a coordinator around a renderer
    pub fn builder(renderer: Arc<dyn Renderer>) -> ViewCoordinatorBuilder {
        ViewCoordinatorBuilder {
            renderer,
            config: ViewConfig::default(),
            profiles: ProfileRegistry::with_builtin(),
            content_view: Arc::new(NullContentView::new()),
            recorder: Arc::new(NullRecorder::new()),
            validator: Arc::new(StaticValidator::default()),
        }
    }

    /// Create a coordinator with default collaborators
    pub fn new(renderer: Arc<dyn Renderer>, config: ViewConfig) -> ViewResult<Self> {
        Self::builder(renderer).config(config).build()
    }

    // ========== Lifecycle ==========

    /// Create the first render session. No-op once initialized.
    pub fn init(&self) -> ViewResult<()> {
        self.ensure_alive()?;
        self.run_lifecycle(LifecycleStep::Init)
    }

    /// Suspend the session before the host goes to the background. Render
    /// commands submitted from now on are held until [`Self::host_resume`].
    ///
    /// Waits for any in-flight transition with no timeout: this returns only
    /// once the session stopped drawing or the view was destroyed.
    pub(crate) fn host_pause(&self) -> ViewResult<()> {
        self.ensure_alive()?;
        self.inner.queue.set_paused(true);

        let (tx, rx) = bounded(1);
        if !self.inner.queue.push_lifecycle(LifecycleStep::Pause, tx) {
            return Err(ViewError::AlreadyDestroyed);
        }
        // A dropped ack means the queue was aborted by destroy
        rx.recv().unwrap_or(Err(ViewError::AlreadyDestroyed))
    }

    /// Resume the session. Runs before any held render command.
    pub(crate) fn host_resume(&self) -> ViewResult<()> {
        self.ensure_alive()?;
        let (tx, rx) = bounded(1);
        if !self.inner.queue.push_lifecycle(LifecycleStep::Resume, tx) {
            return Err(ViewError::AlreadyDestroyed);
        }
        self.inner.queue.set_paused(false);
        self.await_ack(rx)
    }

    /// Release the session and detach the scene. Idempotent; every later
    /// call other than `destroy` fails with [`ViewError::AlreadyDestroyed`].
    pub fn destroy(&self) {
        self.inner.teardown();
    }

    /// Check if destroy already ran
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    // ========== Mode and hardware ==========

    /// Switch between VR and the platform's non-VR mode. Completes on the
    /// transition worker; watch [`ViewEvent`]s or call [`Self::wait_idle`].
    pub fn set_vr_mode_enabled(&self, enabled: bool) -> ViewResult<()> {
        self.ensure_alive()?;

        let inner = &self.inner;
        let recorded = inner.record_before_init(|snap| {
            let mode = inner.profile_for(&snap.descriptor).mode_for(enabled);
            snap.vr_requested = enabled;
            snap.mode = mode;
        });
        if recorded {
            log::debug!("VR mode {} recorded for init", enabled);
            return Ok(());
        }

        inner.snapshot.write().vr_requested = enabled;
        self.push_render(RenderCommand::SetMode(enabled))
    }

    /// Replace the hardware identity (headset or controller change)
    pub fn reconfigure_hardware(&self, descriptor: ModeDescriptor) -> ViewResult<()> {
        self.ensure_alive()?;

        let descriptor = Arc::new(descriptor);
        let inner = &self.inner;
        let recorded = inner.record_before_init(|snap| {
            let mode = inner.profile_for(&descriptor).mode_for(snap.vr_requested);
            snap.descriptor = descriptor.clone();
            snap.mode = mode;
        });
        if recorded {
            log::debug!("Descriptor {} recorded for init", descriptor);
            return Ok(());
        }

        self.push_render(RenderCommand::Reconfigure(descriptor))
    }

    // ========== Scene ==========

    /// Bind a scene to the active session. Applied immediately when no
    /// transition is pending, otherwise exactly once after the pending work.
    pub fn set_scene(&self, scene: Arc<dyn Scene>) -> ViewResult<()> {
        self.ensure_alive()?;

        let inner = &self.inner;
        let accepted = inner
            .queue
            .run_or_push(RenderCommand::SetScene(scene), |command| inner.apply_render(command));
        if accepted {
            Ok(())
        } else {
            Err(ViewError::AlreadyDestroyed)
        }
    }

    /// Check if a live scene is bound
    pub fn scene_bound(&self) -> bool {
        self.inner.scenes.current().is_some()
    }

    // ========== API key ==========

    /// Start validating a license key. Scene submission stops until the
    /// key is accepted. No-op while a validation is pending.
    pub fn validate_api_key(&self, key: impl Into<String>) -> ViewResult<()> {
        self.ensure_alive()?;
        let key = key.into();

        let generation = {
            let mut gate = self.inner.validation.lock();
            let mut snap = self.inner.snapshot.write();
            match snap.api_status {
                ApiKeyStatus::Pending => {
                    log::debug!("API key validation already pending");
                    return Ok(());
                }
                ApiKeyStatus::Valid if gate.key.as_deref() == Some(key.as_str()) => {
                    return Ok(());
                }
                _ => {}
            }

            gate.generation += 1;
            gate.key = Some(key.clone());
            snap.api_status = ApiKeyStatus::Pending;
            self.inner.scenes.set_submit(false);
            gate.generation
        };

        self.inner.stats.lock().validations_dispatched += 1;
        log::debug!("Dispatching API key validation #{}", generation);

        let weak = Arc::downgrade(&self.inner);
        let reply = ValidationReply::new(move |outcome| {
            if let Some(inner) = weak.upgrade() {
                inner.complete_validation(generation, outcome);
            }
        });
        self.inner.validator.validate(key, reply);
        Ok(())
    }

    /// Result of the last key validation
    pub fn api_key_status(&self) -> ApiKeyStatus {
        self.inner.snapshot.read().api_status
    }

    // ========== Debug and tracking ==========

    /// Toggle renderer debug output
    pub fn set_debug(&self, enabled: bool) -> ViewResult<()> {
        self.inner.update_debug(|flags| flags.debug_enabled = enabled)
    }

    /// Toggle the on-screen statistics HUD
    pub fn set_debug_hud_enabled(&self, enabled: bool) -> ViewResult<()> {
        self.inner.update_debug(|flags| flags.hud_enabled = enabled)
    }

    /// Debug flags, applied or buffered for the next session
    pub fn debug_flags(&self) -> DebugFlags {
        self.inner.snapshot.read().debug
    }

    /// Reset head tracking. No-op unless Active in a tracked mode.
    pub fn recenter_tracking(&self) -> ViewResult<()> {
        self.ensure_alive()?;

        let slot = self.inner.session.lock();
        let state = self.inner.snapshot.read().state;
        if state != ViewState::Active {
            log::debug!("Recenter ignored while {}", state);
            return Ok(());
        }

        let Some(session) = slot.session.as_ref() else {
            return Ok(());
        };
        if !self.inner.profile_for(session.descriptor()).is_tracked(session.mode()) {
            log::debug!("Recenter ignored: {} is not tracked", session.mode());
            return Ok(());
        }

        session.recenter()?;
        Ok(())
    }

    // ========== Accessors ==========

    /// Current render session
    pub fn context(&self) -> ViewResult<RenderContext> {
        self.ensure_alive()?;
        let snap = self.inner.snapshot.read();
        if snap.state == ViewState::Uninitialized {
            return Err(ViewError::NotReady);
        }
        snap.context.clone().ok_or(ViewError::NotReady)
    }

    /// Renderer backing the view; `NotReady` unless Active or Suspended
    pub fn renderer(&self) -> ViewResult<Arc<dyn Renderer>> {
        self.ensure_live()?;
        Ok(self.inner.renderer.clone())
    }

    /// Platform widget hosting the surface; `NotReady` unless Active or Suspended
    pub fn content_view(&self) -> ViewResult<Arc<dyn ContentView>> {
        self.ensure_live()?;
        Ok(self.inner.content_view.clone())
    }

    /// Media recorder; `NotReady` before init
    pub fn recorder(&self) -> ViewResult<Arc<dyn MediaRecorder>> {
        self.ensure_alive()?;
        if self.state() == ViewState::Uninitialized {
            return Err(ViewError::NotReady);
        }
        Ok(self.inner.recorder.clone())
    }

    /// Platform name of the current descriptor
    pub fn platform(&self) -> ViewResult<String> {
        Ok(self.mode_descriptor()?.platform().to_string())
    }

    /// Headset name of the current descriptor
    pub fn headset(&self) -> ViewResult<String> {
        Ok(self.mode_descriptor()?.headset().to_string())
    }

    /// Controller name of the current descriptor
    pub fn controller(&self) -> ViewResult<String> {
        Ok(self.mode_descriptor()?.controller().to_string())
    }

    /// Current hardware identity, as one consistent snapshot
    pub fn mode_descriptor(&self) -> ViewResult<Arc<ModeDescriptor>> {
        self.ensure_alive()?;
        Ok(self.inner.snapshot.read().descriptor.clone())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ViewState {
        self.inner.snapshot.read().state
    }

    /// Mode of the current session, or the mode init will create
    pub fn current_mode(&self) -> RenderMode {
        self.inner.snapshot.read().mode
    }

    /// VR as last requested by the host
    pub fn is_vr_mode_enabled(&self) -> bool {
        self.inner.snapshot.read().vr_requested
    }

    /// Last transition or validation failure
    pub fn last_error(&self) -> Option<ViewError> {
        self.inner.snapshot.read().last_error.clone()
    }

    /// Session and transition counters
    pub fn stats(&self) -> ViewStats {
        self.inner.stats.lock().clone()
    }

    /// Subscribe to view events
    pub fn subscribe(&self) -> Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    /// Block until no queued work is runnable. Render commands held by a
    /// host pause do not count.
    pub fn wait_idle(&self, timeout: Duration) -> ViewResult<()> {
        if self.inner.queue.wait_idle(timeout) {
            Ok(())
        } else {
            Err(ViewError::Timeout(timeout))
        }
    }

    // ========== Saved state ==========

    /// Capture the user-visible configuration
    pub fn save_state(&self) -> ViewResult<SavedViewState> {
        self.ensure_alive()?;
        let snap = self.inner.snapshot.read();
        Ok(SavedViewState::new(snap.vr_requested, snap.debug, (*snap.descriptor).clone()))
    }

    /// Apply a saved configuration. Before init it becomes the initial
    /// configuration; afterwards it is queued like any other change.
    pub fn restore_state(&self, saved: &SavedViewState) -> ViewResult<()> {
        self.reconfigure_hardware(saved.descriptor.clone())?;
        self.set_vr_mode_enabled(saved.vr_mode)?;
        let debug = saved.debug;
        self.inner.update_debug(|flags| *flags = debug)
    }

    // ========== Internal ==========

    fn ensure_alive(&self) -> ViewResult<()> {
        if self.inner.is_destroyed() {
            Err(ViewError::AlreadyDestroyed)
        } else {
            Ok(())
        }
    }

    fn ensure_live(&self) -> ViewResult<()> {
        self.ensure_alive()?;
        if self.state().is_live() {
            Ok(())
        } else {
            Err(ViewError::NotReady)
        }
    }

    fn push_render(&self, command: RenderCommand) -> ViewResult<()> {
        if self.inner.queue.push_render(command) {
            Ok(())
        } else {
            Err(ViewError::AlreadyDestroyed)
        }
    }

    fn run_lifecycle(&self, step: LifecycleStep) -> ViewResult<()> {
        let (tx, rx) = bounded(1);
        if !self.inner.queue.push_lifecycle(step, tx) {
            return Err(ViewError::AlreadyDestroyed);
        }
        self.await_ack(rx)
    }

    fn await_ack(&self, rx: Receiver<ViewResult<()>>) -> ViewResult<()> {
        let timeout = self.inner.config.idle_timeout;
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ViewError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ViewError::AlreadyDestroyed),
        }
    }
}

/// Session-lock protected state
#[derive(Default)]
struct SessionSlot {
    session: Option<RenderSession>,
    /// State of the last session lost to a failure, for the next rebuild
    carry: Option<RehydrationState>,
}

#[derive(Default)]
struct ValidationGate {
    /// Bumped per dispatch; older replies are ignored
    generation: u64,
    key: Option<String>,
}

struct Inner {
    config: ViewConfig,
    renderer: Arc<dyn Renderer>,
    content_view: Arc<dyn ContentView>,
    recorder: Arc<dyn MediaRecorder>,
    validator: Arc<dyn ApiKeyValidator>,
    profiles: ProfileRegistry,
    queue: Arc<TransitionQueue>,
    session: Mutex<SessionSlot>,
    snapshot: RwLock<ViewSnapshot>,
    scenes: Arc<SceneSlot>,
    events: EventHub,
    stats: Mutex<ViewStats>,
    validation: Mutex<ValidationGate>,
    destroyed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn profile_for(&self, descriptor: &ModeDescriptor) -> &PlatformProfile {
        self.profiles.profile(self.profiles.resolve(descriptor))
    }

    /// Apply `record` to the snapshot if no session was ever created.
    /// Returns false once initialized.
    fn record_before_init(&self, record: impl FnOnce(&mut ViewSnapshot)) -> bool {
        if self.snapshot.read().state != ViewState::Uninitialized {
            return false;
        }

        let _slot = self.session.lock();
        let mut snap = self.snapshot.write();
        if snap.state != ViewState::Uninitialized {
            return false;
        }
        record(&mut snap);
        true
    }

    fn set_state(&self, to: ViewState) {
        let from = {
            let mut snap = self.snapshot.write();
            std::mem::replace(&mut snap.state, to)
        };
        if from != to {
            log::debug!("View {} -> {}", from, to);
            self.events.emit(ViewEvent::StateChanged { from, to });
        }
    }

    // ========== Worker steps ==========

    fn execute(&self, command: Command) {
        match command {
            Command::Lifecycle(step, ack) => {
                let result = if self.is_destroyed() {
                    Err(ViewError::AlreadyDestroyed)
                } else {
                    match step {
                        LifecycleStep::Init => self.initialize(),
                        LifecycleStep::Resume => self.resume_session(),
                        LifecycleStep::Pause => self.suspend_session(),
                    }
                };
                if let Err(e) = &result {
                    log::warn!("Lifecycle step {:?} failed: {}", step, e);
                }
                // The caller may have timed out
                let _ = ack.send(result);
            }
            Command::Render(command) => {
                if self.is_destroyed() {
                    log::debug!("Dropping {:?} after destroy", command);
                    return;
                }
                self.apply_render(command);
            }
        }
    }

    fn initialize(&self) -> ViewResult<()> {
        let mut slot = self.session.lock();
        let snap = self.snapshot.read().clone();
        if snap.state != ViewState::Uninitialized {
            return Ok(());
        }

        let session = self.create_session(snap.mode, snap.descriptor.clone(), snap.debug, None)?;
        log::info!("View initialized in {} on {}", snap.mode, snap.descriptor);
        self.attach(&mut slot, session);
        self.activate(&mut slot);
        Ok(())
    }

    fn suspend_session(&self) -> ViewResult<()> {
        let mut slot = self.session.lock();
        if self.snapshot.read().state != ViewState::Active {
            return Ok(());
        }

        if let Some(session) = slot.session.as_mut() {
            // The loop is parked even when the renderer reports an error
            if let Err(e) = session.suspend() {
                log::warn!("Renderer failed to suspend {}: {}", session.id(), e);
            }
        }
        self.set_state(ViewState::Suspended);
        Ok(())
    }

    fn resume_session(&self) -> ViewResult<()> {
        let mut slot = self.session.lock();
        match self.snapshot.read().state {
            ViewState::Uninitialized => return Err(ViewError::NotReady),
            ViewState::Suspended => {}
            _ => return Ok(()),
        }

        let resumed = match slot.session.as_mut() {
            Some(session) if !session.is_context_lost() => match session.resume() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("{} could not resume ({}), rebuilding", session.id(), e);
                    false
                }
            },
            _ => false,
        };
        if resumed {
            self.activate(&mut slot);
            return Ok(());
        }

        let carry = self.retire(&mut slot);
        let snap = self.snapshot.read().clone();
        match self.create_session(snap.mode, snap.descriptor.clone(), snap.debug, carry.as_ref()) {
            Ok(session) => {
                self.attach(&mut slot, session);
                self.activate(&mut slot);
                Ok(())
            }
            Err(e) => {
                slot.carry = carry;
                self.snapshot.write().last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn apply_render(&self, command: RenderCommand) {
        let mut slot = self.session.lock();
        let snap = self.snapshot.read().clone();

        match command {
            RenderCommand::SetScene(scene) => self.bind_scene(&slot, scene),
            RenderCommand::SetMode(enabled) => {
                if !snap.state.is_live() {
                    log::debug!("Mode change ignored while {}", snap.state);
                    return;
                }
                let mode = self.profile_for(&snap.descriptor).mode_for(enabled);
                if mode == snap.mode && slot.session.is_some() {
                    log::debug!("Already rendering in {}", mode);
                    return;
                }
                self.transition(&mut slot, snap.descriptor, mode);
            }
            RenderCommand::Reconfigure(descriptor) => {
                if !snap.state.is_live() {
                    log::debug!("Reconfigure ignored while {}", snap.state);
                    return;
                }
                let mode = self.profile_for(&descriptor).mode_for(snap.vr_requested);
                if *descriptor == *snap.descriptor && mode == snap.mode && slot.session.is_some() {
                    log::debug!("Hardware unchanged ({})", descriptor);
                    return;
                }
                self.transition(&mut slot, descriptor, mode);
            }
        }
    }

    fn bind_scene(&self, slot: &SessionSlot, scene: Arc<dyn Scene>) {
        if self.scenes.is_bound(&scene) {
            log::debug!("Scene '{}' already bound", scene.name());
            return;
        }

        self.scenes.bind(&scene);
        let session = slot.session.as_ref().map(|s| s.id());
        self.stats.lock().scenes_bound += 1;
        log::debug!("Bound scene '{}' to {:?}", scene.name(), session);
        self.events.emit(ViewEvent::SceneBound { session });
    }

    /// Move to `mode` on `descriptor`, reusing the session when the surface
    /// and platform profile stay the same
    fn transition(&self, slot: &mut SessionSlot, descriptor: Arc<ModeDescriptor>, mode: RenderMode) {
        let current = self.snapshot.read().descriptor.clone();
        self.set_state(ViewState::ModeTransitioning);
        log::info!("Transition to {} on {}", mode, descriptor);

        let same_profile = self.profiles.resolve(&current) == self.profiles.resolve(&descriptor);
        let reusable = slot
            .session
            .as_ref()
            .map(|s| same_profile && s.surface() == mode.surface_kind() && !s.is_context_lost())
            .unwrap_or(false);

        let result = if reusable {
            self.reuse(slot, descriptor.clone())
        } else {
            self.rebuild(slot, descriptor.clone(), mode)
        };

        match result {
            Ok(()) => {
                self.activate(slot);
                self.stats.lock().transitions_completed += 1;
                if let Some(session) = slot.session.as_ref() {
                    self.events.emit(ViewEvent::ModeChanged {
                        mode,
                        descriptor,
                        session: session.id(),
                    });
                }
            }
            Err(e) => self.fail_transition(slot, e),
        }
    }

    fn reuse(&self, slot: &mut SessionSlot, descriptor: Arc<ModeDescriptor>) -> ViewResult<()> {
        let Some(session) = slot.session.as_mut() else {
            return Err(ViewError::NotReady);
        };

        session.suspend()?;
        session.rebind_descriptor(descriptor.clone());
        {
            let mut snap = self.snapshot.write();
            snap.descriptor = descriptor.clone();
            if let Some(context) = snap.context.as_mut() {
                context.descriptor = descriptor;
            }
        }
        session.resume()?;

        self.stats.lock().sessions_reused += 1;
        log::debug!("Reused {} across the transition", session.id());
        Ok(())
    }

    fn rebuild(&self, slot: &mut SessionSlot, descriptor: Arc<ModeDescriptor>, mode: RenderMode) -> ViewResult<()> {
        let carry = self.retire(slot);
        let debug = {
            let mut snap = self.snapshot.write();
            snap.descriptor = descriptor.clone();
            snap.mode = mode;
            snap.debug
        };

        match self.create_session(mode, descriptor, debug, carry.as_ref()) {
            Ok(session) => {
                self.attach(slot, session);
                Ok(())
            }
            Err(e) => {
                slot.carry = carry;
                Err(e)
            }
        }
    }

    fn fail_transition(&self, slot: &mut SessionSlot, error: ViewError) {
        log::error!("Mode transition failed: {}", error);

        if let Some(session) = slot.session.take() {
            slot.carry = Some(session.rehydration_state());
            self.release(session);
        }
        {
            let mut snap = self.snapshot.write();
            snap.context = None;
            snap.last_error = Some(error.clone());
        }
        self.stats.lock().transitions_failed += 1;

        self.set_state(ViewState::Suspended);
        self.events.emit(ViewEvent::ModeTransitionFailed { error });
    }

    // ========== Session plumbing ==========

    fn create_session(
        &self,
        mode: RenderMode,
        descriptor: Arc<ModeDescriptor>,
        debug: DebugFlags,
        carry: Option<&RehydrationState>,
    ) -> ViewResult<RenderSession> {
        let request = SessionRequest::new(mode, descriptor)
            .with_debug(debug)
            .with_target_fps(self.config.target_fps);
        let session = RenderSession::create(self.renderer.clone(), &request, self.scenes.clone(), carry)?;
        self.stats.lock().sessions_created += 1;
        Ok(session)
    }

    /// Publish Active, then let the session draw. A session never draws
    /// while the published state is Suspended.
    fn activate(&self, slot: &mut SessionSlot) {
        self.set_state(ViewState::Active);
        if let Some(session) = slot.session.as_mut() {
            session.start();
        }
    }

    /// Install a new, still parked session and publish its context
    fn attach(&self, slot: &mut SessionSlot, session: RenderSession) {
        let context = RenderContext {
            session: session.id(),
            handle: session.handle(),
            mode: session.mode(),
            descriptor: session.descriptor().clone(),
        };
        self.content_view.surface_changed(session.surface());
        slot.session = Some(session);

        let mut snap = self.snapshot.write();
        snap.mode = context.mode;
        snap.descriptor = context.descriptor.clone();
        snap.context = Some(context);
    }

    /// Destroy the current session, returning the state its successor
    /// should continue from
    fn retire(&self, slot: &mut SessionSlot) -> Option<RehydrationState> {
        match slot.session.take() {
            Some(session) => {
                let carry = session.rehydration_state();
                self.release(session);
                self.snapshot.write().context = None;
                Some(carry)
            }
            None => slot.carry.take(),
        }
    }

    fn release(&self, session: RenderSession) {
        let id = session.id();
        if let Err(e) = session.destroy() {
            log::warn!("Renderer failed to destroy {}: {}", id, e);
        }
        self.stats.lock().sessions_destroyed += 1;
    }

    // ========== Host thread helpers ==========

    fn update_debug(&self, update: impl FnOnce(&mut DebugFlags)) -> ViewResult<()> {
        if self.is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }

        let mut slot = self.session.lock();
        let flags = {
            let mut snap = self.snapshot.write();
            update(&mut snap.debug);
            snap.debug
        };

        if let Some(session) = slot.session.as_mut() {
            session.set_debug_flags(flags)?;
        }
        Ok(())
    }

    fn complete_validation(&self, generation: u64, outcome: ValidationOutcome) {
        if self.is_destroyed() {
            return;
        }

        let gate = self.validation.lock();
        if gate.generation != generation {
            log::debug!("Ignoring stale validation #{}", generation);
            return;
        }

        let status = match outcome {
            ValidationOutcome::Valid => {
                self.snapshot.write().api_status = ApiKeyStatus::Valid;
                ApiKeyStatus::Valid
            }
            ValidationOutcome::Rejected(reason) => {
                log::warn!("API key rejected: {}", reason);
                let mut snap = self.snapshot.write();
                snap.api_status = ApiKeyStatus::Rejected;
                snap.last_error = Some(ViewError::ValidationRejected(reason));
                ApiKeyStatus::Rejected
            }
        };
        self.scenes.set_submit(status.allows_submission());
        drop(gate);

        self.events.emit(ViewEvent::ValidationCompleted { status });
    }

    fn teardown(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.queue.abort();
        {
            let mut slot = self.session.lock();
            if let Some(session) = slot.session.take() {
                self.release(session);
            }
            slot.carry = None;
            self.scenes.clear();
            self.snapshot.write().context = None;
            self.set_state(ViewState::Destroyed);
        }

        if self.recorder.is_recording() {
            self.recorder.stop();
        }
        self.content_view.detached();
        log::info!("View destroyed");

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("Transition worker panicked");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn run_worker(queue: Arc<TransitionQueue>, inner: Weak<Inner>) {
    log::debug!("Transition worker started");
    let mut initialized = false;

    while let Some(command) = queue.next() {
        let Some(inner) = inner.upgrade() else {
            queue.finish();
            break;
        };

        inner.execute(command);
        if !initialized && inner.snapshot.read().state != ViewState::Uninitialized {
            initialized = true;
            queue.mark_initialized();
        }

        drop(inner);
        queue.finish();
    }

    log::debug!("Transition worker stopped");
}
