//! Per-session render thread
//!
//! The loop owns one OS thread that calls a [`FrameDriver`] at the target
//! rate. A new loop is parked until the first [`RenderLoop::resume`].
//! [`RenderLoop::pause`] is synchronous: once it returns, no frame is in
//! flight and none will start until the next resume.

use crate::timing::FrameTiming;
use crate::RendererError;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Draws one frame; receives the frame number
pub type FrameDriver = Box<dyn FnMut(u64) -> Result<(), RendererError> + Send>;

struct LoopControl {
    paused: bool,
    stopped: bool,
    /// A frame is executing on the render thread
    drawing: bool,
    /// Set when the driver reported a lost context; the loop parks
    lost: Option<RendererError>,
    timing: FrameTiming,
}

struct LoopShared {
    control: Mutex<LoopControl>,
    wake: Condvar,
    next_frame: AtomicU64,
    frames_drawn: AtomicU64,
}

/// Render thread handle
pub struct RenderLoop {
    name: String,
    shared: Arc<LoopShared>,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoop {
    /// Spawn the render thread, parked.
    ///
    /// `first_frame` lets a rebuilt session continue the frame sequence of
    /// its predecessor.
    pub fn spawn(
        name: impl Into<String>,
        first_frame: u64,
        target_fps: u32,
        driver: FrameDriver,
    ) -> Result<Self, RendererError> {
        let name = name.into();
        let shared = Arc::new(LoopShared {
            control: Mutex::new(LoopControl {
                paused: true,
                stopped: false,
                drawing: false,
                lost: None,
                timing: FrameTiming::new(target_fps),
            }),
            wake: Condvar::new(),
            next_frame: AtomicU64::new(first_frame),
            frames_drawn: AtomicU64::new(0),
        });

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(thread_shared, driver))
            .map_err(|e| RendererError::DeviceUnavailable(format!("render thread: {}", e)))?;

        log::debug!("Render loop '{}' spawned at frame {}", name, first_frame);

        Ok(Self {
            name,
            shared,
            thread: Some(thread),
        })
    }

    /// Stop drawing; returns after any in-flight frame completed
    pub fn pause(&self) {
        let mut ctl = self.shared.control.lock();
        ctl.paused = true;
        self.shared.wake.notify_all();
        while ctl.drawing {
            self.shared.wake.wait(&mut ctl);
        }
    }

    /// Start or continue drawing
    pub fn resume(&self) {
        let mut ctl = self.shared.control.lock();
        if ctl.paused {
            ctl.paused = false;
            ctl.timing.reset_pacing();
            self.shared.wake.notify_all();
        }
    }

    /// Error that parked the loop, if any
    pub fn lost(&self) -> Option<RendererError> {
        self.shared.control.lock().lost.clone()
    }

    /// Frame number the next frame will carry
    pub fn next_frame_number(&self) -> u64 {
        self.shared.next_frame.load(Ordering::Acquire)
    }

    /// Frames successfully drawn by this loop
    pub fn frames_drawn(&self) -> u64 {
        self.shared.frames_drawn.load(Ordering::Acquire)
    }

    /// Average frame rate over recent frames
    pub fn average_fps(&self) -> f64 {
        self.shared.control.lock().timing.average_fps()
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        {
            let mut ctl = self.shared.control.lock();
            ctl.stopped = true;
            self.shared.wake.notify_all();
        }

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::error!("Render loop '{}' panicked", self.name);
            } else {
                log::debug!("Render loop '{}' stopped", self.name);
            }
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<LoopShared>, mut driver: FrameDriver) {
    loop {
        let number = {
            let mut ctl = shared.control.lock();
            loop {
                if ctl.stopped {
                    return;
                }
                if ctl.paused || ctl.lost.is_some() {
                    shared.wake.wait(&mut ctl);
                    continue;
                }
                let wait = ctl.timing.time_to_wait();
                if wait.is_zero() {
                    break;
                }
                shared.wake.wait_for(&mut ctl, wait);
            }
            ctl.drawing = true;
            ctl.timing.begin_frame();
            shared.next_frame.fetch_add(1, Ordering::AcqRel)
        };

        let result = driver(number);

        let mut ctl = shared.control.lock();
        ctl.drawing = false;
        match result {
            Ok(()) => {
                shared.frames_drawn.fetch_add(1, Ordering::AcqRel);
            }
            Err(RendererError::ContextLost(reason)) => {
                log::error!("Render loop lost its context at frame {}: {}", number, reason);
                ctl.lost = Some(RendererError::ContextLost(reason));
            }
            Err(e) => {
                log::warn!("Frame {} failed: {}", number, e);
            }
        }
        shared.wake.notify_all();
    }
}
