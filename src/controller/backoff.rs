//! # Fibonacci Backoff
//!
//! Progressive retry intervals for resources that keep asking to be requeued.
//!
//! The sequence follows the Fibonacci numbers scaled by the minimum interval
//! (`min, min, 2*min, 3*min, 5*min, ...`) and is capped at the maximum.

use std::time::{Duration, Instant};

/// Fibonacci backoff state for a single resource
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// Create a backoff bounded by `min_secs` and `max_secs`
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: 1,
        }
    }

    /// Next interval in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let interval = self.current.saturating_mul(self.min_secs).min(self.max_secs);
        // Stop advancing once capped
        if interval < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        interval
    }

    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = 1;
    }

    /// Interval for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut seconds = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            seconds = backoff.next_backoff_seconds();
            if seconds >= backoff.max_secs {
                break;
            }
        }
        Duration::from_secs(seconds)
    }
}

/// Where a resource stands between reconciliations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySchedule {
    /// Nothing scheduled
    Idle,
    /// A retry is scheduled and due after the remaining time
    Pending(Duration),
    /// The last pass was final; only a spec change or a request reruns it
    Halted,
}

/// Per-resource requeue tracking kept by the watch loop
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    /// When the scheduled retry is due
    pub retry_at: Option<Instant>,
    pub halted: bool,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            retry_at: None,
            halted: false,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Count a failure and schedule the next retry
    pub fn schedule_retry(&mut self) -> Duration {
        self.increment_error();
        let delay = Duration::from_secs(self.backoff.next_backoff_seconds());
        self.retry_at = Some(Instant::now() + delay);
        self.halted = false;
        delay
    }

    /// Settle the resource: forget past errors and stop retrying until it changes
    pub fn halt(&mut self) {
        self.reset();
        self.halted = true;
    }

    /// Time left until the scheduled retry, if one is still pending
    pub fn pending_retry(&self) -> Option<Duration> {
        self.retry_at
            .map(|at| at.saturating_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn schedule(&self) -> RetrySchedule {
        if self.halted {
            return RetrySchedule::Halted;
        }
        self.pending_retry()
            .map_or(RetrySchedule::Idle, RetrySchedule::Pending)
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.retry_at = None;
        self.halted = false;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_fibonacci_scaled_by_min() {
        let mut backoff = FibonacciBackoff::new(5, 1000);
        let seq: Vec<u64> = (0..7).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![5, 5, 10, 15, 25, 40, 65]);
    }

    #[test]
    fn test_sequence_caps_at_max() {
        let mut backoff = FibonacciBackoff::new(5, 12);
        let seq: Vec<u64> = (0..6).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![5, 5, 10, 12, 12, 12]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(2, 100);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }

    #[test]
    fn test_calculate_for_error_count() {
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(0, 60, 3600),
            Duration::from_secs(60)
        );
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(4, 60, 3600),
            Duration::from_secs(300)
        );
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(50, 60, 3600),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_state_tracks_errors() {
        let mut state = BackoffState::new(1, 10);
        state.increment_error();
        state.increment_error();
        assert_eq!(state.error_count, 2);
        state.reset();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.backoff.next_backoff_seconds(), 1);
    }

    #[test]
    fn test_scheduled_retry_is_pending() {
        let mut state = BackoffState::new(30, 300);
        assert_eq!(state.pending_retry(), None);

        let delay = state.schedule_retry();
        assert_eq!(delay, Duration::from_secs(30));
        assert_eq!(state.error_count, 1);
        let remaining = state.pending_retry().unwrap();
        assert!(remaining <= delay);

        state.reset();
        assert_eq!(state.pending_retry(), None);
    }

    #[test]
    fn test_halt_replaces_pending_retry() {
        let mut state = BackoffState::new(30, 300);
        assert_eq!(state.schedule(), RetrySchedule::Idle);

        state.schedule_retry();
        state.schedule_retry();
        assert!(matches!(state.schedule(), RetrySchedule::Pending(_)));

        state.halt();
        assert_eq!(state.schedule(), RetrySchedule::Halted);
        assert_eq!(state.error_count, 0);

        state.schedule_retry();
        assert!(matches!(state.schedule(), RetrySchedule::Pending(_)));

        state.reset();
        assert_eq!(state.schedule(), RetrySchedule::Idle);
    }
}
