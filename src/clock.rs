//! Time sources and frame pacing.
//!
//! Both the entity cooldown and the alarm debounce are wall-clock timers measured
//! in milliseconds, so behaviour does not depend on the frame rate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Milliseconds on the clock's own epoch.
pub type Millis = u64;

pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Monotonic clock starting at zero when created.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Manually advanced clock. Clones share the same time, so a test can keep one
/// handle while the loop owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: Millis) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Waits for the next paint opportunity of a display refreshing at `refresh_hz`.
///
/// There is no frame budget: if a cycle took longer than one refresh interval
/// the next cycle starts immediately.
#[derive(Debug)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_tick: Option<Instant>,
}

impl FramePacer {
    pub fn new(refresh_hz: u32) -> Self {
        let interval = (refresh_hz > 0).then(|| Duration::from_secs_f64(1.0 / refresh_hz as f64));
        Self {
            interval,
            last_tick: None,
        }
    }

    /// Pacer that never waits.
    pub fn immediate() -> Self {
        Self {
            interval: None,
            last_tick: None,
        }
    }

    /// Block until the next refresh boundary, then mark it.
    pub fn wait_next_paint(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_tick) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_tick = Some(Instant::now());
    }

    /// Forget the last tick so a resumed loop starts without waiting.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        handle.advance(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set(10);
        assert_eq!(handle.now_ms(), 10);
    }

    #[test]
    fn immediate_pacer_does_not_sleep() {
        let mut pacer = FramePacer::immediate();
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait_next_paint();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn pacer_spaces_ticks_by_interval() {
        let mut pacer = FramePacer::new(100);
        let start = Instant::now();
        pacer.wait_next_paint();
        pacer.wait_next_paint();
        pacer.wait_next_paint();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
