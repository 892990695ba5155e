use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frame counter that reports an fps figure once per one-second window.
#[derive(Debug, Clone)]
pub struct FrameStats {
    frame_count: u32,
    window_start: Instant,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start: now,
        }
    }

    /// Counts one presented frame. Returns the new fps value when a window closes.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }
        let fps = (self.frame_count as f32 / elapsed.as_secs_f32()).round() as u32;
        self.frame_count = 0;
        self.window_start = now;
        Some(fps)
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}
