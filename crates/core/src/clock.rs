//! Progress arithmetic for the single playback timer.
//!
//! The runtime owns the actual periodic task; this type decides what a tick
//! means. Every start hands out a fresh [`ClockToken`] and a tick is only
//! honoured when it carries the live token, so ticks queued by a superseded
//! timer can never move progress.

use serde::{Deserialize, Serialize};

/// Default tick period.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 100;

/// Generation tag of one started clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockToken(u64);

impl ClockToken {
    /// Monotonic generation number.
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Tick from a stopped or superseded clock; nothing changed.
    Stale,
    /// Progress advanced to the given percentage.
    Progress(f64),
    /// The block finished. Reported once per generation.
    Complete,
}

/// Elapsed-time bookkeeping for the current block.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    period_ms: u64,
    generation: u64,
    live: Option<u64>,
    block_ms: u64,
    elapsed_ms: u64,
}

impl PlaybackClock {
    /// Creates a stopped clock ticking every `period_ms`.
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            generation: 0,
            live: None,
            block_ms: 1,
            elapsed_ms: 0,
        }
    }

    /// Tick period in milliseconds.
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Stops the clock and prepares it for a new block of `block_ms`.
    pub fn arm(&mut self, block_ms: u64) {
        self.live = None;
        self.block_ms = block_ms.max(1);
        self.elapsed_ms = 0;
    }

    /// Starts (or resumes) ticking, superseding any earlier generation.
    /// Elapsed time is kept, so resuming after a pause continues the block.
    pub fn start(&mut self) -> ClockToken {
        self.generation += 1;
        self.live = Some(self.generation);
        ClockToken(self.generation)
    }

    /// Stops ticking without touching elapsed time.
    pub fn stop(&mut self) {
        self.live = None;
    }

    /// Token of the running generation, if any.
    pub fn live_token(&self) -> Option<ClockToken> {
        self.live.map(ClockToken)
    }

    /// Duration of the armed block.
    pub fn block_ms(&self) -> u64 {
        self.block_ms
    }

    /// Elapsed share of the block, 0..=100.
    pub fn progress_percent(&self) -> f64 {
        (self.elapsed_ms as f64 * 100.0 / self.block_ms as f64).min(100.0)
    }

    /// Applies one tick.
    pub fn tick(&mut self, token: ClockToken) -> TickOutcome {
        if self.live != Some(token.0) {
            return TickOutcome::Stale;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(self.period_ms).min(self.block_ms);
        if self.elapsed_ms >= self.block_ms {
            self.live = None;
            return TickOutcome::Complete;
        }
        TickOutcome::Progress(self.progress_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_second_block_completes_on_tick_one_hundred() {
        let mut clock = PlaybackClock::new(DEFAULT_TICK_PERIOD_MS);
        clock.arm(10_000);
        let token = clock.start();

        for i in 1..100 {
            assert_eq!(clock.tick(token), TickOutcome::Progress(i as f64));
        }
        assert_eq!(clock.tick(token), TickOutcome::Complete);
        assert_eq!(clock.progress_percent(), 100.0);
    }

    #[test]
    fn completion_is_reported_once() {
        let mut clock = PlaybackClock::new(100);
        clock.arm(150);
        let token = clock.start();
        assert_eq!(clock.tick(token), TickOutcome::Progress(100.0 * 100.0 / 150.0));
        assert_eq!(clock.tick(token), TickOutcome::Complete);
        assert_eq!(clock.tick(token), TickOutcome::Stale);
        assert!(clock.live_token().is_none());
    }

    #[test]
    fn superseded_generation_is_stale() {
        let mut clock = PlaybackClock::new(100);
        clock.arm(1_000);
        let old = clock.start();
        clock.arm(2_000);
        let new = clock.start();
        assert!(new.generation() > old.generation());

        assert_eq!(clock.tick(old), TickOutcome::Stale);
        assert_eq!(clock.progress_percent(), 0.0);
        assert_eq!(clock.tick(new), TickOutcome::Progress(5.0));
    }

    #[test]
    fn resume_keeps_elapsed_time() {
        let mut clock = PlaybackClock::new(100);
        clock.arm(1_000);
        let first = clock.start();
        clock.tick(first);
        clock.tick(first);
        clock.stop();
        assert_eq!(clock.tick(first), TickOutcome::Stale);

        let second = clock.start();
        assert_eq!(clock.tick(second), TickOutcome::Progress(30.0));
    }

    #[test]
    fn progress_never_exceeds_one_hundred() {
        let mut clock = PlaybackClock::new(100);
        clock.arm(1);
        let token = clock.start();
        assert_eq!(clock.tick(token), TickOutcome::Complete);
        assert!(clock.progress_percent() <= 100.0);
    }
}
