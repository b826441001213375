//! Cancellable timeline playback

use crate::session::Session;
use crate::time::Ms;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocking source of playback ticks
pub trait Ticker {
    /// Waits for the next tick and returns the milliseconds elapsed since the previous one
    fn tick(&mut self) -> Ms;
}

/// Ticks at a fixed wall-clock interval
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Duration,
    last: Instant,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> Ms {
        let due = self.last + self.interval;
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed.as_secs_f64() * 1000.0
    }
}

/// Shared flag that stops a running playback
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a playback run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The cursor reached the end of the timeline
    Finished,
    /// The token was cancelled first
    Aborted,
}

/// Advances a session's cursor in real time
#[derive(Debug, Clone, Copy)]
pub struct Playback {
    rate: f64,
}

impl Default for Playback {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

impl Playback {
    /// Playback at `rate` times real time. Non-positive or non-finite rates play at 1.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Plays from the cursor to the end of the document, calling `on_tick` after every step.
    ///
    /// A cursor at or past the end rewinds to 0 first. Errors from `on_tick` stop playback.
    pub fn run(
        &self,
        session: &mut Session,
        ticker: &mut impl Ticker,
        token: &CancellationToken,
        mut on_tick: impl FnMut(&Session) -> Result<()>,
    ) -> Result<PlaybackOutcome> {
        let end = session.document().true_end();
        if session.ms() >= end {
            session.set_ms(0.0);
        }
        tracing::debug!(from = session.ms(), end, rate = self.rate, "playback started");

        loop {
            if token.is_cancelled() {
                tracing::debug!(at = session.ms(), "playback aborted");
                return Ok(PlaybackOutcome::Aborted);
            }

            let elapsed = ticker.tick();
            let next = session.ms() + elapsed * self.rate;
            if next >= end {
                session.set_ms(end);
                on_tick(session)?;
                return Ok(PlaybackOutcome::Finished);
            }
            session.set_ms(next);
            on_tick(session)?;
        }
    }
}
