use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{LimitError, Result};

const NANOS_PER_SEC: f64 = 1e9;

/// Fraction of the fill interval accepted as a completed tick.
const MAX_DEVIATION: f64 = 0.05;

/// Token bucket that fills at a fixed rate up to a burst capacity.
///
/// The balance is only computed when a consumer asks for tokens, from the
/// number of fill intervals elapsed since `origin`. The balance may go
/// negative: a request is always granted and the caller is told how long to
/// wait until the debt is covered by elapsed time.
#[derive(Debug)]
pub struct TokenBucket {
    origin: Instant,
    state:  Mutex<State>,
}

#[derive(Debug)]
struct State {
    /// Nanoseconds per token.
    fill_interval: u64,
    /// Distance from a tick boundary still rounded up to a full tick.
    max_offset:    u64,
    capacity:      i64,
    last_tick:     i64,
    tokens:        i64,
    /// Elapsed nanoseconds at which the current fill interval took effect.
    epoch_elapsed: u128,
    /// Tick index reached when the current fill interval took effect.
    epoch_tick:    i64,
    /// Latest elapsed nanoseconds observed by `take`.
    last_elapsed:  u128,
}

impl TokenBucket {
    /// Create a bucket refilling at `rate` tokens per second, holding at most
    /// `capacity` tokens.
    ///
    /// The bucket starts empty at `now`, which is also the reference point all
    /// later instants are measured from.
    pub fn new(rate: f64, capacity: i64, now: Instant) -> Result<Self> {
        let fill_interval = interval_for(rate)?;
        check_capacity(capacity)?;

        Ok(Self {
            origin: now,
            state:  Mutex::new(State {
                fill_interval,
                max_offset: offset_for(fill_interval),
                capacity,
                last_tick: 0,
                tokens: 0,
                epoch_elapsed: 0,
                epoch_tick: 0,
                last_elapsed: 0,
            }),
        })
    }

    /// Replace the refill rate and the capacity.
    ///
    /// The current balance is kept. A lower capacity clamps it on the next
    /// [`take`](Self::take); a new rate only changes the pace of ticks after
    /// the latest instant the bucket has seen. No instant is passed here, so
    /// time between that instant and the update is credited at the new rate.
    pub fn update_limit(&self, rate: f64, capacity: i64) -> Result<()> {
        let fill_interval = interval_for(rate)?;
        check_capacity(capacity)?;

        let mut state = self.lock();
        if state.fill_interval != fill_interval {
            state.epoch_elapsed = state.last_elapsed;
            state.epoch_tick = state.last_tick;
            state.fill_interval = fill_interval;
            state.max_offset = offset_for(fill_interval);
        }
        state.capacity = capacity;

        tracing::debug!(rate, capacity, "token bucket limit updated");
        Ok(())
    }

    /// Debit `amount` tokens at `now` and return how long the caller must wait
    /// before the debit is covered.
    ///
    /// A non-positive `amount` is a no-op returning [`Duration::ZERO`].
    pub fn take(&self, now: Instant, amount: i64) -> Duration {
        if amount <= 0 {
            return Duration::ZERO;
        }

        let elapsed = self.elapsed_nanos(now);
        let mut state = self.lock();
        let remainder = state.advance(elapsed);
        state.tokens = state.tokens.saturating_sub(amount);

        if state.tokens >= 0 {
            tracing::trace!(amount, tokens = state.tokens, "tokens granted");
            return Duration::ZERO;
        }

        let debt = u128::from(state.tokens.unsigned_abs());
        let wait = debt * u128::from(state.fill_interval) - remainder;
        let wait = Duration::from_nanos(u64::try_from(wait).unwrap_or(u64::MAX));

        tracing::trace!(amount, tokens = state.tokens, ?wait, "tokens owed");
        wait
    }

    pub fn capacity(&self) -> i64 { self.lock().capacity }

    pub fn fill_interval(&self) -> Duration { Duration::from_nanos(self.lock().fill_interval) }

    /// Tokens per second, derived from the current fill interval.
    pub fn rate(&self) -> f64 { NANOS_PER_SEC / self.lock().fill_interval as f64 }

    /// Instant the bucket was created at.
    pub fn origin(&self) -> Instant { self.origin }

    fn elapsed_nanos(&self, now: Instant) -> u128 {
        match now.checked_duration_since(self.origin) {
            Some(elapsed) => elapsed.as_nanos(),
            None => {
                tracing::warn!(
                    behind = ?self.origin.duration_since(now),
                    "instant precedes token bucket origin"
                );
                0
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every mutation completes inside one critical section, so a poisoned
        // lock still guards a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    /// Credit the ticks elapsed since the last request and return the progress
    /// made towards the next tick.
    fn advance(&mut self, elapsed: u128) -> u128 {
        self.last_elapsed = self.last_elapsed.max(elapsed);

        let interval = u128::from(self.fill_interval);
        let since_epoch = elapsed.saturating_sub(self.epoch_elapsed);
        let mut ticks = since_epoch / interval;
        let mut remainder = since_epoch % interval;

        if interval - remainder <= u128::from(self.max_offset) {
            ticks += 1;
            remainder = 0;
        }

        let tick = i64::try_from(ticks)
            .unwrap_or(i64::MAX)
            .saturating_add(self.epoch_tick);
        let delta = tick - self.last_tick;
        if delta > 0 {
            self.tokens = self.tokens.saturating_add(delta);
            self.last_tick = tick;
        }
        if self.tokens > self.capacity {
            self.tokens = self.capacity;
        }

        remainder
    }
}

/// Check that `rate` and `capacity` describe a usable bucket.
pub fn check_limit(rate: f64, capacity: i64) -> Result<()> {
    interval_for(rate)?;
    check_capacity(capacity)
}

fn interval_for(rate: f64) -> Result<u64> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(LimitError::InvalidRate(rate));
    }
    let nanos = NANOS_PER_SEC / rate;
    if nanos < 1.0 {
        return Err(LimitError::RateTooHigh(rate));
    }
    // Float to integer casts saturate, so vanishingly small rates cap at u64::MAX.
    Ok(nanos as u64)
}

fn offset_for(fill_interval: u64) -> u64 { (fill_interval as f64 * MAX_DEVIATION) as u64 }

fn check_capacity(capacity: i64) -> Result<()> {
    if capacity <= 0 {
        return Err(LimitError::InvalidCapacity(capacity));
    }
    Ok(())
}
