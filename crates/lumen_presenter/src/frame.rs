//! Frame requests and scene submission
//!
//! The render loop builds one [`FrameRequest`] per tick from the shared
//! [`SceneSlot`]. The slot is the only place a scene reaches the renderer.

use lumen_xr::RenderMode;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A host-owned scene graph.
///
/// Views only hold weak references; the host decides the scene's lifetime.
pub trait Scene: Send + Sync + 'static {
    /// Name for logs
    fn name(&self) -> &str {
        "scene"
    }
}

/// Shared scene binding read by the render thread every frame
pub struct SceneSlot {
    /// Bound scene (weak: the host owns it)
    scene: RwLock<Option<Weak<dyn Scene>>>,
    /// Whether scene geometry may be submitted
    submit: AtomicBool,
}

impl SceneSlot {
    /// Create an empty slot that allows submission
    pub fn new() -> Self {
        Self {
            scene: RwLock::new(None),
            submit: AtomicBool::new(true),
        }
    }

    /// Replace the bound scene in one step
    pub fn bind(&self, scene: &Arc<dyn Scene>) {
        *self.scene.write() = Some(Arc::downgrade(scene));
    }

    /// Drop the binding
    pub fn clear(&self) {
        *self.scene.write() = None;
    }

    /// Check if `scene` is the bound scene
    pub fn is_bound(&self, scene: &Arc<dyn Scene>) -> bool {
        self.scene
            .read()
            .as_ref()
            .map(|bound| Weak::ptr_eq(bound, &Arc::downgrade(scene)))
            .unwrap_or(false)
    }

    /// Get the bound scene if the host still owns it
    pub fn current(&self) -> Option<Arc<dyn Scene>> {
        self.scene.read().as_ref().and_then(Weak::upgrade)
    }

    /// Allow or suppress scene submission
    pub fn set_submit(&self, submit: bool) {
        self.submit.store(submit, Ordering::Release);
    }

    /// Check if scene submission is allowed
    pub fn submits_scene(&self) -> bool {
        self.submit.load(Ordering::Acquire)
    }

    /// Scene to submit for the next frame, honoring the submission gate
    pub fn frame_scene(&self) -> Option<Arc<dyn Scene>> {
        if self.submits_scene() {
            self.current()
        } else {
            None
        }
    }
}

impl Default for SceneSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame handed to the renderer
pub struct FrameRequest {
    /// Frame number (continues across session rebuilds)
    number: u64,
    /// Mode the frame renders in
    mode: RenderMode,
    /// Scene to draw; `None` renders an empty frame to keep the surface alive
    scene: Option<Arc<dyn Scene>>,
}

impl FrameRequest {
    /// Create a frame request
    pub fn new(number: u64, mode: RenderMode, scene: Option<Arc<dyn Scene>>) -> Self {
        Self { number, mode, scene }
    }

    /// Get frame number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Get render mode
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Number of eye views to render
    pub fn view_count(&self) -> u32 {
        self.mode.surface_kind().view_count()
    }

    /// Scene to draw, if any
    pub fn scene(&self) -> Option<&Arc<dyn Scene>> {
        self.scene.as_ref()
    }

    /// Check if scene geometry is submitted this frame
    pub fn submits_scene(&self) -> bool {
        self.scene.is_some()
    }
}

impl fmt::Debug for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRequest")
            .field("number", &self.number)
            .field("mode", &self.mode)
            .field("scene", &self.scene.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestScene;
    impl Scene for TestScene {}

    #[test]
    fn test_scene_slot_binding() {
        let slot = SceneSlot::new();
        let a: Arc<dyn Scene> = Arc::new(TestScene);
        let b: Arc<dyn Scene> = Arc::new(TestScene);

        assert!(slot.current().is_none());

        slot.bind(&a);
        assert!(slot.is_bound(&a));
        assert!(!slot.is_bound(&b));

        slot.bind(&b);
        assert!(slot.is_bound(&b));

        slot.clear();
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_submission_gate() {
        let slot = SceneSlot::new();
        let scene: Arc<dyn Scene> = Arc::new(TestScene);
        slot.bind(&scene);

        assert!(slot.frame_scene().is_some());

        slot.set_submit(false);
        assert!(slot.frame_scene().is_none());
        assert!(slot.current().is_some());
    }

    #[test]
    fn test_weak_binding() {
        let slot = SceneSlot::new();
        let scene: Arc<dyn Scene> = Arc::new(TestScene);
        slot.bind(&scene);
        drop(scene);

        assert!(slot.current().is_none());
    }

    #[test]
    fn test_frame_request() {
        let frame = FrameRequest::new(7, RenderMode::Vr, None);
        assert_eq!(frame.number(), 7);
        assert_eq!(frame.view_count(), 2);
        assert!(!frame.submits_scene());
    }
}
