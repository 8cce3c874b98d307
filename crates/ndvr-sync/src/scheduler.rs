//! Round scheduling
//!
//! A [`RoundScheduler`] turns a round count and a round duration into a
//! bounded sequence of round-start signals followed by termination.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ndvr_core::Clock;
use tracing::trace;

/// What the router should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundSignal {
    /// Start the given round (1-based)
    Start(u64),
    /// All rounds are over
    Terminate,
}

/// Emits exactly `rounds` start signals spaced by `duration`
pub struct RoundScheduler<C> {
    rounds: u64,
    duration: Duration,
    start_offset: Duration,
    clock: Arc<C>,
    issued: u64,
    started_at: Option<Instant>,
    terminated: bool,
}

impl<C: Clock> RoundScheduler<C> {
    /// Create a scheduler whose first round starts immediately
    pub fn new(rounds: u64, duration: Duration, clock: Arc<C>) -> Self {
        Self {
            rounds,
            duration,
            start_offset: Duration::ZERO,
            clock,
            issued: 0,
            started_at: None,
            terminated: false,
        }
    }

    /// Delay the first round
    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = offset;
        self
    }

    /// Wait for the next signal
    ///
    /// Round `k` starts at `offset + (k - 1) * duration`. Termination is
    /// signalled once the last round's window has elapsed, and on every
    /// call after that.
    pub async fn next(&mut self) -> RoundSignal {
        if self.terminated {
            return RoundSignal::Terminate;
        }

        let started_at = match self.started_at {
            Some(at) => at,
            None => {
                if !self.start_offset.is_zero() {
                    self.clock.sleep(self.start_offset).await;
                }
                let now = self.clock.now();
                self.started_at = Some(now);
                now
            }
        };

        let deadline = started_at + self.window_offset(self.issued);
        let now = self.clock.now();
        if deadline > now {
            self.clock.sleep(deadline - now).await;
        }

        if self.issued >= self.rounds {
            self.terminated = true;
            trace!(rounds = self.rounds, "Rounds exhausted");
            return RoundSignal::Terminate;
        }

        self.issued += 1;
        trace!(round = self.issued, "Round start");
        RoundSignal::Start(self.issued)
    }

    /// Number of start signals issued so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Configured number of rounds
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    fn window_offset(&self, windows: u64) -> Duration {
        self.duration
            .saturating_mul(u32::try_from(windows).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndvr_core::SystemClock;

    #[tokio::test(start_paused = true)]
    async fn test_emits_rounds_then_terminates() {
        let mut scheduler = RoundScheduler::new(3, Duration::from_secs(40), Arc::new(SystemClock));
        let begin = tokio::time::Instant::now();

        assert_eq!(scheduler.next().await, RoundSignal::Start(1));
        assert_eq!(begin.elapsed(), Duration::ZERO);
        assert_eq!(scheduler.next().await, RoundSignal::Start(2));
        assert_eq!(begin.elapsed(), Duration::from_secs(40));
        assert_eq!(scheduler.next().await, RoundSignal::Start(3));
        assert_eq!(begin.elapsed(), Duration::from_secs(80));

        assert_eq!(scheduler.next().await, RoundSignal::Terminate);
        assert_eq!(begin.elapsed(), Duration::from_secs(120));
        assert_eq!(scheduler.next().await, RoundSignal::Terminate);
        assert_eq!(begin.elapsed(), Duration::from_secs(120));
        assert_eq!(scheduler.issued(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_offset() {
        let mut scheduler = RoundScheduler::new(1, Duration::from_secs(5), Arc::new(SystemClock))
            .with_start_offset(Duration::from_millis(30));
        let begin = tokio::time::Instant::now();

        assert_eq!(scheduler.next().await, RoundSignal::Start(1));
        assert_eq!(begin.elapsed(), Duration::from_millis(30));
        assert_eq!(scheduler.next().await, RoundSignal::Terminate);
        assert_eq!(begin.elapsed(), Duration::from_millis(5030));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_round_does_not_shift_schedule() {
        let clock = Arc::new(SystemClock);
        let mut scheduler = RoundScheduler::new(2, Duration::from_secs(10), Arc::clone(&clock));
        let begin = tokio::time::Instant::now();

        assert_eq!(scheduler.next().await, RoundSignal::Start(1));
        clock.sleep(Duration::from_secs(7)).await;
        assert_eq!(scheduler.next().await, RoundSignal::Start(2));
        assert_eq!(begin.elapsed(), Duration::from_secs(10));
    }
}
