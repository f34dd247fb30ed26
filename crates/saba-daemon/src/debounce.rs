use std::sync::Mutex;
use tokio::time::{Duration, Instant};

/// The tuning knob is read capacitively and chatters near the edge of a
/// frequency band.
pub const FREQUENCY_DEBOUNCE: Duration = Duration::from_millis(500);

/// Lets one event through per window.  The first event always passes.
pub struct Debouncer {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    pub fn frequency() -> Self {
        Self::new(FREQUENCY_DEBOUNCE)
    }

    /// True when the window since the last accepted event has elapsed.
    /// Rejected events do not extend the window.
    pub fn check(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
