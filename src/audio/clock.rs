use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Current playback position of the active track, in seconds.
pub trait PlaybackClock {
    fn current_time(&self) -> f64;
}

/// Position derived from the number of frames the playback tap has let through.
#[derive(Clone)]
pub struct SampleClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self { frames, sample_rate }
    }
}

impl PlaybackClock for SampleClock {
    fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

/// Externally driven clock for offline rendering and tests.
///
/// Clones share the same position, so a driver can keep one handle and hand
/// another to the stage.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<f64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.0.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.0.set(self.0.get() + seconds);
    }
}

impl PlaybackClock for ManualClock {
    fn current_time(&self) -> f64 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clock_tracks_frames() {
        let frames = Arc::new(AtomicU64::new(0));
        let clock = SampleClock::new(frames.clone(), 48_000);
        assert_eq!(clock.current_time(), 0.0);

        frames.store(72_000, Ordering::Relaxed);
        assert!((clock.current_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_manual_clock_handles_share_position() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.set(10.0);
        handle.advance(0.5);
        assert_eq!(clock.current_time(), 10.5);
    }
}
