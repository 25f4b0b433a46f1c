//! Tick pacing: a ticker-driven controller with a pluggable `Strategy`,
//! reset after every tick based on its outcome.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a completed tick tells the strategy about what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSignal {
    /// The tick failed outright (a repository fetch or OS-detection error).
    Failure,
    /// The tick succeeded and did at least one unit of work.
    HasWork,
    /// The tick succeeded and found nothing to do.
    NoWork,
}

pub trait Strategy: Send + Sync {
    fn next_interval(&mut self, signal: TickSignal) -> Duration;
    fn reset(&mut self);
}

/// Backs off multiplicatively on failure, resets to `base` on any success.
/// Does not distinguish `HasWork` from `NoWork`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    failures: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier,
            failures: 0,
        }
    }
}

impl Strategy for ExponentialBackoff {
    fn next_interval(&mut self, signal: TickSignal) -> Duration {
        match signal {
            TickSignal::Failure => {
                self.failures += 1;
                let scaled = self.base.as_secs_f64() * self.multiplier.powi(self.failures as i32 - 1);
                Duration::from_secs_f64(scaled).min(self.max)
            }
            TickSignal::HasWork | TickSignal::NoWork => {
                self.failures = 0;
                self.base
            }
        }
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Speeds up while there's a steady stream of work, slows down and
/// eventually idles when ticks keep finding nothing to do.
#[derive(Debug, Clone)]
pub struct Adaptive {
    min: Duration,
    max: Duration,
    idle: Duration,
    threshold_fast: u32,
    threshold_slow: u32,
    work_streak: u32,
    no_work_streak: u32,
    current: Duration,
}

impl Adaptive {
    #[must_use]
    pub fn new(min: Duration, max: Duration, idle: Duration) -> Self {
        Self::with_thresholds(min, max, idle, 2, 5)
    }

    #[must_use]
    pub fn with_thresholds(
        min: Duration,
        max: Duration,
        idle: Duration,
        threshold_fast: u32,
        threshold_slow: u32,
    ) -> Self {
        Self {
            min,
            max,
            idle,
            threshold_fast,
            threshold_slow,
            work_streak: 0,
            no_work_streak: 0,
            current: min,
        }
    }
}

impl Strategy for Adaptive {
    fn next_interval(&mut self, signal: TickSignal) -> Duration {
        match signal {
            TickSignal::Failure | TickSignal::HasWork => {
                self.work_streak += 1;
                self.no_work_streak = 0;
                if self.work_streak >= self.threshold_fast {
                    self.current = self.min;
                }
            }
            TickSignal::NoWork => {
                self.no_work_streak += 1;
                self.work_streak = 0;
                if self.no_work_streak >= 3 * self.threshold_slow {
                    self.current = self.idle;
                } else if self.no_work_streak >= self.threshold_slow {
                    let scaled = self.current.as_secs_f64() * 1.5;
                    self.current = Duration::from_secs_f64(scaled).min(self.max);
                }
            }
        }
        self.current
    }

    fn reset(&mut self) {
        self.work_streak = 0;
        self.no_work_streak = 0;
        self.current = self.min;
    }
}

/// Drives the reconcile loop on a schedule governed by `strategy`. Owns no
/// use-case logic itself: `tick` is given as an async closure so the
/// controller stays decoupled from `ConfigureNetworkUseCase`/
/// `DeleteNetworkUseCase` construction, which both need borrowed, per-tick
/// references to the leaf abstractions.
pub struct PollingController<S: Strategy> {
    strategy: S,
}

impl<S: Strategy> PollingController<S> {
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// Runs `tick` forever, reposing for the interval the strategy returns
    /// after observing each outcome, until `shutdown` is cancelled. The
    /// sleep itself races the cancellation so a pending shutdown doesn't
    /// wait out a full idle interval before the loop notices.
    pub async fn run<Fut>(&mut self, shutdown: &CancellationToken, mut tick: impl FnMut() -> Fut)
    where
        Fut: std::future::Future<Output = TickSignal>,
    {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            let signal = tick().await;
            let interval = self.strategy.next_interval(signal);
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = shutdown.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_sequence_matches_spec() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(300), 2.0);

        let expected = [30, 60, 120, 240, 300, 300];
        for secs in expected {
            let interval = strategy.next_interval(TickSignal::Failure);
            assert_eq!(interval, Duration::from_secs(secs));
        }

        let interval = strategy.next_interval(TickSignal::HasWork);
        assert_eq!(interval, Duration::from_secs(30));
    }

    #[test]
    fn exponential_backoff_treats_has_work_and_no_work_alike() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(300), 2.0);
        strategy.next_interval(TickSignal::Failure);
        assert_eq!(
            strategy.next_interval(TickSignal::NoWork),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn adaptive_speeds_up_after_threshold_fast_consecutive_work_ticks() {
        let mut strategy = Adaptive::with_thresholds(
            Duration::from_secs(5),
            Duration::from_secs(300),
            Duration::from_secs(600),
            2,
            5,
        );
        strategy.next_interval(TickSignal::HasWork);
        let interval = strategy.next_interval(TickSignal::HasWork);
        assert_eq!(interval, Duration::from_secs(5));
    }

    #[test]
    fn adaptive_slows_down_then_idles_after_consecutive_no_work_ticks() {
        let mut strategy = Adaptive::with_thresholds(
            Duration::from_secs(5),
            Duration::from_secs(300),
            Duration::from_secs(600),
            2,
            5,
        );
        // five consecutive no-work ticks cross threshold_slow, scaling up
        for _ in 0..5 {
            strategy.next_interval(TickSignal::NoWork);
        }
        assert!(strategy.next_interval(TickSignal::NoWork) > Duration::from_secs(5));

        // fifteen total (3 * threshold_slow) switches to the idle interval
        let mut strategy = Adaptive::with_thresholds(
            Duration::from_secs(5),
            Duration::from_secs(300),
            Duration::from_secs(600),
            2,
            5,
        );
        let mut last = Duration::ZERO;
        for _ in 0..15 {
            last = strategy.next_interval(TickSignal::NoWork);
        }
        assert_eq!(last, Duration::from_secs(600));
    }

    #[test]
    fn reset_returns_adaptive_to_its_minimum() {
        let mut strategy = Adaptive::new(
            Duration::from_secs(5),
            Duration::from_secs(300),
            Duration::from_secs(600),
        );
        for _ in 0..10 {
            strategy.next_interval(TickSignal::NoWork);
        }
        strategy.reset();
        assert_eq!(
            strategy.next_interval(TickSignal::HasWork),
            Duration::from_secs(5)
        );
    }
}
