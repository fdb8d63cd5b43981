//! Frame pacing for the render loop

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const HISTORY: usize = 120;

/// Paces frames to a target rate and keeps a short interval history.
///
/// A target of 0 fps means unpaced: the loop draws as fast as the
/// renderer accepts frames.
#[derive(Debug, Clone)]
pub struct FrameTiming {
    interval: Duration,
    /// Earliest start of the next frame; `None` right after creation or resume
    deadline: Option<Instant>,
    last_start: Option<Instant>,
    intervals: VecDeque<Duration>,
    frame_count: u64,
}

impl FrameTiming {
    pub fn new(target_fps: u32) -> Self {
        let interval = match target_fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs(1) / fps,
        };
        Self {
            interval,
            deadline: None,
            last_start: None,
            intervals: VecDeque::with_capacity(HISTORY),
            frame_count: 0,
        }
    }

    pub fn target_frame_time(&self) -> Duration {
        self.interval
    }

    /// Record the start of a frame and schedule the next one
    pub fn begin_frame(&mut self) -> Instant {
        let now = Instant::now();
        if let Some(previous) = self.last_start.replace(now) {
            if self.intervals.len() == HISTORY {
                self.intervals.pop_front();
            }
            self.intervals.push_back(now - previous);
        }
        self.deadline = Some(now + self.interval);
        self.frame_count += 1;
        now
    }

    /// How long the loop should sleep before the next frame
    pub fn time_to_wait(&self) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Drop the schedule so time spent suspended is not recorded as a frame
    pub fn reset_pacing(&mut self) {
        self.deadline = None;
        self.last_start = None;
    }

    pub fn average_fps(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let total: Duration = self.intervals.iter().sum();
        let mean = total.as_secs_f64() / self.intervals.len() as f64;
        if mean > 0.0 {
            1.0 / mean
        } else {
            0.0
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}
