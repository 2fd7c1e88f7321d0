use std::time::{Duration, Instant};

/// Per-frame timing handed to the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Seconds since the timer started; drives animated constants.
    pub elapsed: f32,
}

impl FrameTime {
    #[must_use]
    pub const fn new(delta: f32, elapsed: f32) -> Self {
        Self { delta, elapsed }
    }
}

/// Wall-clock source of [`FrameTime`] for interactive runs.
///
/// Tests and offline renders build `FrameTime` values directly instead.
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    last: FrameTime,
    ticks: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            last: FrameTime::default(),
            ticks: 0,
        }
    }

    /// Marks the start of a frame and returns its timing.
    ///
    /// The first tick reports the time since construction as its delta.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta: Duration = now - self.last_tick;
        self.last_tick = now;
        self.ticks += 1;
        self.last = FrameTime::new(delta.as_secs_f32(), (now - self.start).as_secs_f32());
        self.last
    }

    /// Timing returned by the most recent [`tick`](Self::tick).
    #[must_use]
    pub fn frame_time(&self) -> FrameTime {
        self.last
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.ticks
    }
}
