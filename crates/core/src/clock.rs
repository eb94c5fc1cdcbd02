use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const MILLIS_PER_MINUTE: u64 = 60_000;

/// Source of elapsed session time.
///
/// Implementations must be monotonic: for a fixed session the value returned by
/// `elapsed_millis` never decreases.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the session started.
    fn elapsed_millis(&self) -> u64;

    /// Whole minutes elapsed since the session started, `floor(elapsed_ms / 60000)`.
    fn elapsed_minutes(&self) -> u64 {
        self.elapsed_millis() / MILLIS_PER_MINUTE
    }
}

/// Wall-clock session timer backed by `Instant`, which is monotonic by construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn elapsed_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_minute(minute: u64) -> Self {
        let clock = Self::new();
        clock.set_minutes(minute);
        clock
    }

    pub fn advance_millis(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward to `minute`. Earlier values are ignored so time never runs backwards.
    pub fn set_minutes(&self, minute: u64) {
        self.millis
            .fetch_max(minute * MILLIS_PER_MINUTE, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
