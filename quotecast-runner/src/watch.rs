//! Periodic refresh loop.
//!
//! Re-runs the whole fetch → pipeline sequence for a fixed set of tickers on
//! a timer. Frames come through the session's cache, so a refresh period
//! shorter than the cache TTL re-serves the same bars.

use crate::session::{ForecastRequest, Session, SessionError};
use quotecast_core::PipelineResult;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Results of one refresh round.
#[derive(Debug)]
pub struct WatchTick {
    /// Zero-based round number.
    pub round: u64,
    pub results: Vec<(String, Result<PipelineResult, SessionError>)>,
}

impl WatchTick {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub period: Duration,
    /// Stop after this many rounds; run until stopped when `None`.
    pub max_rounds: Option<u64>,
    /// Set to request a stop between rounds.
    pub stop: Arc<AtomicBool>,
}

impl WatchOptions {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            max_rounds: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_rounds(mut self, rounds: u64) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Run refresh rounds until `on_tick` breaks, `max_rounds` is reached, or
/// the stop flag is set. Returns the number of completed rounds.
pub fn watch(
    session: &Session,
    requests: &[ForecastRequest],
    options: &WatchOptions,
    mut on_tick: impl FnMut(&WatchTick) -> ControlFlow<()>,
) -> u64 {
    let mut round = 0;
    loop {
        if options.stopped() || options.max_rounds.is_some_and(|max| round >= max) {
            break;
        }

        let started = Instant::now();
        let tick = WatchTick {
            round,
            results: session.forecast_many(requests),
        };
        for (ticker, result) in &tick.results {
            if let Err(e) = result {
                log::warn!("{ticker}: {e}");
            }
        }
        log::debug!(
            "round {round}: {}/{} tickers in {:?}",
            tick.successes(),
            tick.results.len(),
            started.elapsed()
        );
        round += 1;

        if on_tick(&tick).is_break() {
            break;
        }
        if options.max_rounds.is_some_and(|max| round >= max) {
            break;
        }
        sleep_until_next(options, started);
    }
    round
}

/// Sleep out the rest of the period in short slices so a stop request is
/// noticed promptly.
fn sleep_until_next(options: &WatchOptions, started: Instant) {
    const SLICE: Duration = Duration::from_millis(200);
    while !options.stopped() {
        let elapsed = started.elapsed();
        if elapsed >= options.period {
            return;
        }
        std::thread::sleep((options.period - elapsed).min(SLICE));
    }
}
