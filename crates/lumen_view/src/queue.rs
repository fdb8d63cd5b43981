//! Transition queue
//!
//! Structural work for one coordinator runs serially on a single worker.
//! Commands come in two lanes:
//!
//! - **lifecycle** commands always run first
//! - **render** commands (mode, hardware, scene) wait while the render gate
//!   is closed: before the first session exists and while the host is paused
//!
//! The queue lock is the first lock in the coordinator's order
//! (queue, then session, then snapshot).

use crate::error::ViewError;
use crossbeam_channel::Sender;
use lumen_presenter::Scene;
use lumen_xr::ModeDescriptor;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reply channel for a lifecycle command
pub(crate) type Ack = Sender<Result<(), ViewError>>;

/// Host lifecycle steps, acknowledged when done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleStep {
    Init,
    Resume,
    Pause,
}

/// Commands that change what is rendered
#[derive(Clone)]
pub(crate) enum RenderCommand {
    SetMode(bool),
    Reconfigure(Arc<ModeDescriptor>),
    SetScene(Arc<dyn Scene>),
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetMode(vr) => write!(f, "SetMode(vr={})", vr),
            Self::Reconfigure(descriptor) => write!(f, "Reconfigure({})", descriptor),
            Self::SetScene(scene) => write!(f, "SetScene({})", scene.name()),
        }
    }
}

pub(crate) enum Command {
    Lifecycle(LifecycleStep, Ack),
    Render(RenderCommand),
}

#[derive(Default)]
struct QueueState {
    lifecycle: VecDeque<(LifecycleStep, Ack)>,
    render: VecDeque<RenderCommand>,
    initialized: bool,
    paused: bool,
    in_flight: bool,
    shutdown: bool,
}

impl QueueState {
    fn render_open(&self) -> bool {
        self.initialized && !self.paused
    }

    fn has_runnable(&self) -> bool {
        !self.lifecycle.is_empty() || (self.render_open() && !self.render.is_empty())
    }

    /// Nothing runnable and nothing executing. Held render commands do not count.
    fn is_idle(&self) -> bool {
        !self.in_flight && !self.has_runnable()
    }

    /// Nothing queued at all and nothing executing
    fn is_settled(&self) -> bool {
        !self.in_flight && self.lifecycle.is_empty() && self.render.is_empty()
    }
}

/// Two-lane command queue feeding the transition worker
#[derive(Default)]
pub(crate) struct TransitionQueue {
    state: Mutex<QueueState>,
    work: Condvar,
    idle: Condvar,
}

impl TransitionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a lifecycle step. Returns false once the queue is shut down.
    pub fn push_lifecycle(&self, step: LifecycleStep, ack: Ack) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        state.lifecycle.push_back((step, ack));
        self.work.notify_one();
        true
    }

    /// Queue a render command. Returns false once the queue is shut down.
    pub fn push_render(&self, command: RenderCommand) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        log::debug!("Queued {:?}", command);
        state.render.push_back(command);
        self.work.notify_one();
        true
    }

    /// Run `apply` right away when nothing is queued or executing, otherwise
    /// queue the command behind the pending work. `apply` runs under the
    /// queue lock.
    pub fn run_or_push(&self, command: RenderCommand, apply: impl FnOnce(RenderCommand)) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        if state.is_settled() {
            apply(command);
        } else {
            log::debug!("Queued {:?}", command);
            state.render.push_back(command);
            self.work.notify_one();
        }
        true
    }

    /// Block until a command is runnable and mark it in flight.
    /// Returns `None` after [`TransitionQueue::abort`].
    pub fn next(&self) -> Option<Command> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some((step, ack)) = state.lifecycle.pop_front() {
                state.in_flight = true;
                return Some(Command::Lifecycle(step, ack));
            }
            if state.render_open() {
                if let Some(command) = state.render.pop_front() {
                    state.in_flight = true;
                    return Some(Command::Render(command));
                }
            }
            self.work.wait(&mut state);
        }
    }

    /// The in-flight command is done
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        if state.is_idle() {
            self.idle.notify_all();
        }
    }

    /// The first session exists; render commands may run when not paused
    pub fn mark_initialized(&self) {
        let mut state = self.state.lock();
        state.initialized = true;
        self.work.notify_one();
    }

    /// Close or open the render gate for a host pause
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.paused = paused;
        if !paused {
            self.work.notify_one();
        } else if state.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Render commands waiting for the gate or the worker
    pub fn pending_render(&self) -> usize {
        self.state.lock().render.len()
    }

    /// Wait until nothing runnable is left. Commands held behind a closed
    /// render gate do not keep the queue busy.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.shutdown && !state.is_idle() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.shutdown || state.is_idle();
            }
        }
        true
    }

    /// Drop every queued command and stop the worker. Pending lifecycle
    /// callers see their ack channel disconnect.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        let dropped = state.lifecycle.len() + state.render.len();
        state.lifecycle.clear();
        state.render.clear();
        if dropped > 0 {
            log::debug!("Transition queue aborted, {} commands dropped", dropped);
        }
        self.work.notify_all();
        self.idle.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    fn mode(vr: bool) -> RenderCommand {
        RenderCommand::SetMode(vr)
    }

    #[test]
    fn test_lifecycle_runs_first() {
        let queue = TransitionQueue::new();
        queue.mark_initialized();
        queue.push_render(mode(true));
        let (tx, _rx) = bounded(1);
        queue.push_lifecycle(LifecycleStep::Resume, tx);

        assert!(matches!(queue.next(), Some(Command::Lifecycle(LifecycleStep::Resume, _))));
        queue.finish();
        assert!(matches!(queue.next(), Some(Command::Render(RenderCommand::SetMode(true)))));
        queue.finish();
    }

    #[test]
    fn test_render_held_while_paused() {
        let queue = Arc::new(TransitionQueue::new());
        queue.mark_initialized();
        queue.set_paused(true);
        queue.push_render(mode(true));

        assert!(queue.wait_idle(Duration::from_millis(50)));
        assert_eq!(queue.pending_render(), 1);

        let worker = {
            let queue = queue.clone();
            thread::spawn(move || {
                let command = queue.next();
                queue.finish();
                command.is_some()
            })
        };

        thread::sleep(Duration::from_millis(10));
        assert_eq!(queue.pending_render(), 1);

        queue.set_paused(false);
        assert!(worker.join().unwrap());
        assert_eq!(queue.pending_render(), 0);
    }

    #[test]
    fn test_render_held_until_initialized() {
        let queue = TransitionQueue::new();
        queue.push_render(mode(false));
        assert!(queue.wait_idle(Duration::from_millis(10)));

        queue.mark_initialized();
        assert!(!queue.wait_idle(Duration::from_millis(10)));
    }

    #[test]
    fn test_run_or_push() {
        let queue = TransitionQueue::new();
        let mut applied = 0;
        queue.run_or_push(mode(true), |_| applied += 1);
        assert_eq!(applied, 1);
        assert_eq!(queue.pending_render(), 0);

        queue.push_render(mode(false));
        queue.run_or_push(mode(true), |_| applied += 1);
        assert_eq!(applied, 1);
        assert_eq!(queue.pending_render(), 2);
    }

    #[test]
    fn test_abort_disconnects_acks() {
        let queue = TransitionQueue::new();
        let (tx, rx) = bounded(1);
        queue.push_lifecycle(LifecycleStep::Init, tx);
        queue.abort();

        assert!(rx.recv().is_err());
        assert!(queue.next().is_none());
        assert!(!queue.push_render(mode(true)));
    }
}
