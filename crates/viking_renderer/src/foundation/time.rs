//! Time management utilities

use std::time::{Duration, Instant};

/// Wall clock measuring time since the renderer started animating
///
/// The uniform update derives the model rotation from this, so animation
/// speed does not depend on frame rate.
#[derive(Debug, Clone, Copy)]
pub struct AnimationClock {
    start: Instant,
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::start_now()
    }
}

impl AnimationClock {
    /// Start a clock at the current instant
    pub fn start_now() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time since start in seconds
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }
}

/// Frame counter for periodic frame-rate reporting
pub struct FrameStats {
    started: Instant,
    window_start: Instant,
    frame_count: u64,
    window_frames: u32,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    /// Create a new counter
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            window_start: now,
            frame_count: 0,
            window_frames: 0,
        }
    }

    /// Record a presented frame.
    ///
    /// Returns the frame rate over the last `interval` once that much time has
    /// passed, then starts a new measuring window.
    pub fn record_frame(&mut self, interval: Duration) -> Option<f32> {
        self.frame_count += 1;
        self.window_frames += 1;

        let window = self.window_start.elapsed();
        if window < interval {
            return None;
        }

        let fps = self.window_frames as f32 / window.as_secs_f32();
        self.window_start = Instant::now();
        self.window_frames = 0;
        Some(fps)
    }

    /// Total number of recorded frames
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frame rate since creation
    pub fn average_fps(&self) -> f32 {
        let total = self.started.elapsed().as_secs_f32();
        if total > 0.0 {
            self.frame_count as f32 / total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = AnimationClock::start_now();
        let first = clock.elapsed();
        let second = clock.elapsed();
        assert!(second >= first);
    }

    #[test]
    fn test_frame_stats_reports_after_interval() {
        let mut stats = FrameStats::new();

        assert!(stats.record_frame(Duration::from_secs(3600)).is_none());
        let fps = stats.record_frame(Duration::ZERO);

        assert!(fps.is_some());
        assert_eq!(stats.frame_count(), 2);
    }
}
