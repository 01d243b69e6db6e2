use std::time::{Duration, Instant};

use crate::audio::SnapshotSource;
use crate::buffer::{SampleBuffer, WrapPolicy};
use crate::types::{Threshold, TickOutcome};

pub const DEFAULT_PERIOD_MS: u64 = 250;
pub const DEFAULT_CAPACITY: usize = 240;

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cancellable periodic task. The next tick is due one period after the
/// previous tick *finished*, so ticks never overlap and drift by their own
/// run time.
#[derive(Clone, Debug)]
pub struct Ticker {
    period: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// First tick is due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    pub fn rearm(&mut self, completed_at: Instant) {
        if self.next_due.is_some() {
            self.next_due = Some(completed_at + self.period);
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

/// Arithmetic mean of a magnitude snapshot. Empty snapshots read as silence.
pub fn compute_level(snapshot: &[u8]) -> f64 {
    if snapshot.is_empty() {
        return 0.0;
    }
    let sum: u64 = snapshot.iter().map(|&m| m as u64).sum();
    sum as f64 / snapshot.len() as f64
}

/// Seconds between `start` and `now`, rounded to two decimals.
pub fn elapsed_seconds(start: Instant, now: Instant) -> f64 {
    let secs = now.saturating_duration_since(start).as_secs_f64();
    (secs * 100.0).round() / 100.0
}

/// State of one capture session: the sample buffer and its start time.
#[derive(Clone, Debug)]
pub struct SamplerSession {
    buffer: SampleBuffer,
    started_at: Instant,
    ticks: u64,
}

impl SamplerSession {
    pub fn new(capacity: usize, policy: WrapPolicy, started_at: Instant) -> Self {
        Self {
            buffer: SampleBuffer::new(capacity, policy),
            started_at,
            ticks: 0,
        }
    }

    /// Reduces one snapshot to a level, stores it and classifies it against
    /// `threshold`. No side effects beyond the buffer.
    pub fn tick(&mut self, snapshot: &[u8], now: Instant, threshold: Threshold) -> TickOutcome {
        let level = compute_level(snapshot);
        let elapsed = elapsed_seconds(self.started_at, now);
        let slot = self.buffer.push(elapsed, level);
        self.ticks += 1;

        TickOutcome {
            tick: self.ticks,
            level,
            elapsed,
            slot,
            alert: threshold.classify(level),
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Receives every completed tick. Rendering hangs off this.
pub trait TickObserver {
    fn on_tick(&mut self, session: &SamplerSession, outcome: &TickOutcome);
}

/// Drives a [`SamplerSession`] from a snapshot source on a [`Ticker`].
pub struct Sampler<S, C> {
    source: S,
    clock: C,
    session: SamplerSession,
    ticker: Ticker,
}

impl<S: SnapshotSource, C: Clock> Sampler<S, C> {
    pub fn start(
        source: S,
        clock: C,
        capacity: usize,
        policy: WrapPolicy,
        period: Duration,
    ) -> Self {
        let now = clock.now();
        let mut ticker = Ticker::new(period);
        ticker.start(now);
        Self {
            source,
            clock,
            session: SamplerSession::new(capacity, policy, now),
            ticker,
        }
    }

    /// Runs at most one tick if it is due. `threshold` is read at call time.
    pub fn poll<O: TickObserver>(
        &mut self,
        threshold: Threshold,
        observer: &mut O,
    ) -> Option<TickOutcome> {
        let now = self.clock.now();
        if !self.ticker.is_due(now) {
            return None;
        }

        let outcome = {
            let snapshot = self.source.snapshot();
            self.session.tick(snapshot, now, threshold)
        };
        observer.on_tick(&self.session, &outcome);

        self.ticker.rearm(self.clock.now());
        Some(outcome)
    }

    pub fn stop(&mut self) {
        self.ticker.cancel();
    }

    pub fn session(&self) -> &SamplerSession {
        &self.session
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }
}
