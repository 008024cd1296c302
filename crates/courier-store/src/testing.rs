use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::store::NowFn;

/// Deterministic clock for tests: starts at a fixed millisecond and advances
/// one millisecond per observation, so every timestamp in a test run is
/// distinct and reproducible.
#[derive(Clone)]
pub struct TestClock {
    millis: Arc<Mutex<i64>>,
}

impl TestClock {
    pub fn at(start_millis: i64) -> Self {
        Self {
            millis: Arc::new(Mutex::new(start_millis)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut millis = self.millis.lock().expect("clock lock");
        *millis += 1;
        DateTime::from_timestamp_millis(*millis).expect("valid millis")
    }

    pub fn now_fn(&self) -> NowFn {
        let clock = self.clone();
        Arc::new(move || clock.now())
    }

    /// Jump the clock forward, e.g. past a TTL.
    pub fn advance(&self, millis: i64) {
        let mut guard = self.millis.lock().expect("clock lock");
        *guard += millis;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_ticks() {
        let clock = TestClock::at(1_234_567_890_000);
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a.timestamp_millis(), 1_234_567_890_001);
        assert_eq!(b.timestamp_millis(), 1_234_567_890_002);
    }

    #[test]
    fn test_clock_shared_across_clones() {
        let clock = TestClock::at(0);
        let f = clock.now_fn();
        f();
        assert_eq!(clock.now().timestamp_millis(), 2);
    }
}
