//! Elapsed clock and one-shot dismiss timers
//!
//! Timers are plain deadlines; the service sleeps until the earliest one and
//! asks the manager what is due. Cancelling is removing a deadline, so it is
//! always idempotent.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct ElapsedClock {
    start: Instant,
    next_tick: Instant,
}

/// Timer bookkeeping for the tracker
#[derive(Debug)]
pub struct TimerManager {
    tick: Duration,
    clock: Option<ElapsedClock>,
    elapsed: Duration,
    dismissals: HashMap<String, Instant>,
}

impl TimerManager {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            clock: None,
            elapsed: Duration::ZERO,
            dismissals: HashMap::new(),
        }
    }

    /// Start (or restart) the elapsed clock for a start time
    pub fn start_elapsed_clock(&mut self, start: Instant, now: Instant) -> u64 {
        self.elapsed = now.saturating_duration_since(start);
        self.clock = Some(ElapsedClock {
            start,
            next_tick: now + self.tick,
        });
        self.elapsed.as_secs()
    }

    /// Stop ticking and reset the counter
    pub fn stop_elapsed_clock(&mut self) {
        self.clock = None;
        self.elapsed = Duration::ZERO;
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_some()
    }

    /// Whole seconds on the clock
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.as_secs()
    }

    /// Advance the clock if a tick is due; returns the new elapsed seconds
    pub fn tick_clock(&mut self, now: Instant) -> Option<u64> {
        let clock = self.clock.as_mut()?;
        if clock.next_tick > now {
            return None;
        }
        self.elapsed = now.saturating_duration_since(clock.start);
        clock.next_tick = now + self.tick;
        Some(self.elapsed.as_secs())
    }

    /// Schedule removal of `key` after `delay`, replacing any earlier schedule
    pub fn schedule_dismiss(&mut self, key: &str, delay: Duration, now: Instant) {
        if self.cancel_scheduled_dismiss(key) {
            tracing::debug!("Rescheduled dismissal of {}", key);
        }
        self.dismissals.insert(key.to_string(), now + delay);
    }

    /// Cancel a pending dismissal; returns whether one existed
    pub fn cancel_scheduled_dismiss(&mut self, key: &str) -> bool {
        self.dismissals.remove(key).is_some()
    }

    pub fn dismiss_deadline(&self, key: &str) -> Option<Instant> {
        self.dismissals.get(key).copied()
    }

    /// Remove and return every dismissal that is due, earliest first
    pub fn take_due_dismissals(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = self
            .dismissals
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, key.clone()))
            .collect();
        due.sort();

        for (_, key) in &due {
            self.dismissals.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Earliest pending deadline across the clock and dismissals
    pub fn next_deadline(&self) -> Option<Instant> {
        let clock = self.clock.map(|c| c.next_tick);
        let dismiss = self.dismissals.values().min().copied();
        match (clock, dismiss) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Cancel every timer
    pub fn clear(&mut self) {
        self.stop_elapsed_clock();
        self.dismissals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn test_elapsed_clock_ticks() {
        let mut timers = TimerManager::new(TICK);
        let start = Instant::now();
        let now = start + Duration::from_secs(3);

        assert_eq!(timers.start_elapsed_clock(start, now), 3);
        assert_eq!(timers.tick_clock(now + Duration::from_millis(500)), None);
        assert_eq!(timers.tick_clock(now + TICK), Some(4));
        assert_eq!(timers.next_deadline(), Some(now + TICK * 2));
    }

    #[test]
    fn test_stop_resets_clock() {
        let mut timers = TimerManager::new(TICK);
        let start = Instant::now();
        timers.start_elapsed_clock(start, start + Duration::from_secs(10));
        timers.stop_elapsed_clock();

        assert!(!timers.is_clock_running());
        assert_eq!(timers.elapsed_secs(), 0);
        assert_eq!(timers.tick_clock(start + Duration::from_secs(20)), None);
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_reschedule_replaces_previous() {
        let mut timers = TimerManager::new(TICK);
        let t0 = Instant::now();
        timers.schedule_dismiss("D1", Duration::from_secs(5), t0);
        timers.schedule_dismiss("D1", Duration::from_secs(8), t0);

        assert!(timers.take_due_dismissals(t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(timers.take_due_dismissals(t0 + Duration::from_secs(8)), vec!["D1"]);
        assert!(timers.take_due_dismissals(t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timers = TimerManager::new(TICK);
        let t0 = Instant::now();
        timers.schedule_dismiss("a.pdf", Duration::from_secs(3), t0);

        assert!(timers.cancel_scheduled_dismiss("a.pdf"));
        assert!(!timers.cancel_scheduled_dismiss("a.pdf"));
        assert!(timers.take_due_dismissals(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_due_dismissals_in_deadline_order() {
        let mut timers = TimerManager::new(TICK);
        let t0 = Instant::now();
        timers.schedule_dismiss("late", Duration::from_secs(8), t0);
        timers.schedule_dismiss("early", Duration::from_secs(4), t0);

        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(4)));
        assert_eq!(
            timers.take_due_dismissals(t0 + Duration::from_secs(9)),
            vec!["early", "late"]
        );
    }
}
