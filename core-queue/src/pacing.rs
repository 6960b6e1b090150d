use bridge_traits::time::Clock;
use core_async::time::Duration;
use std::sync::Arc;

/// Minimum gap between two dispatches of the same queue.
pub(crate) struct Pacer {
    clock: Arc<dyn Clock>,
    last_dispatch_ms: Option<i64>,
    min_gap: Duration,
}

impl Pacer {
    pub(crate) fn new(min_gap: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_dispatch_ms: None,
            min_gap,
        }
    }

    /// Time still to wait before the next dispatch, if any.
    ///
    /// Never more than the gap itself, even when the wall clock stepped
    /// backward since the last dispatch.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        let last = self.last_dispatch_ms?;
        let elapsed_ms = self.clock.unix_timestamp_millis() - last;
        let required_ms = self.min_gap.as_millis() as i64;
        (elapsed_ms < required_ms)
            .then(|| Duration::from_millis((required_ms - elapsed_ms).min(required_ms) as u64))
    }

    pub(crate) fn mark(&mut self) {
        self.last_dispatch_ms = Some(self.clock.unix_timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;
    use chrono::Utc;

    #[test]
    fn test_no_wait_before_first_dispatch() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let pacer = Pacer::new(Duration::from_millis(2000), clock);
        assert_eq!(pacer.remaining(), None);
    }

    #[test]
    fn test_remaining_shrinks_with_time() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut pacer = Pacer::new(Duration::from_millis(2000), clock.clone());

        pacer.mark();
        assert_eq!(pacer.remaining(), Some(Duration::from_millis(2000)));

        clock.advance_millis(1500);
        assert_eq!(pacer.remaining(), Some(Duration::from_millis(500)));

        clock.advance_millis(500);
        assert_eq!(pacer.remaining(), None);
    }

    #[test]
    fn test_backward_clock_step_waits_at_most_the_gap() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let mut pacer = Pacer::new(Duration::from_millis(2000), clock.clone());

        pacer.mark();
        clock.set(start - chrono::Duration::hours(1));
        assert_eq!(pacer.remaining(), Some(Duration::from_millis(2000)));

        clock.set(start - chrono::Duration::milliseconds(300));
        assert_eq!(pacer.remaining(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_zero_gap_never_waits() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut pacer = Pacer::new(Duration::ZERO, clock);
        pacer.mark();
        assert_eq!(pacer.remaining(), None);
    }
}
