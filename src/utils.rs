use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Frame statistics for a streaming run, with both
/// *all-time* counters and a *sliding 1 s window* rate.
#[derive(Debug)]
pub struct Counter {
    /// All-time frames written successfully
    pub n_frames: u64,
    /// All-time failed writes
    pub n_failed: u64,
    /// Time when this counter was created
    pub t_begin: Instant,

    // --- sliding window fields ---
    window: Duration,
    frames: VecDeque<Instant>,
}

impl Default for Counter {
    fn default() -> Self {
        Counter {
            n_frames: 0,
            n_failed: 0,
            t_begin: Instant::now(),
            window: Duration::from_secs(1),
            frames: VecDeque::new(),
        }
    }
}

impl Counter {
    /// Create a new Counter with a 1 s sliding window.
    pub fn new() -> Self {
        Default::default()
    }

    /// Long-term average frame rate since t_begin, in Hz
    pub fn average_rate(&self) -> f64 {
        let secs = self.t_begin.elapsed().as_secs_f64().max(1e-6);
        self.n_frames as f64 / secs
    }

    /// Sliding-window frame rate over the last `window` duration, in Hz
    pub fn rate(&self) -> f64 {
        let secs = self.window.as_secs_f64().max(1e-6);
        self.frames.len() as f64 / secs
    }

    /// Record one successfully written frame.
    pub fn increment(&mut self) {
        let now = Instant::now();
        self.n_frames += 1;
        self.frames.push_back(now);

        while let Some(&ts) = self.frames.front() {
            if now.duration_since(ts) > self.window {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn fail(&mut self) {
        self.n_failed += 1;
    }
}
