use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sluice_bucket::{Clock, SystemClock, TokenBucket};

use crate::sleep::{Sleeper, ThreadSleeper};

/// Reader that limits the bandwidth of another reader.
///
/// Each read is forwarded to the wrapped source first. The bytes it produced
/// are then charged to both buckets and the calling thread sleeps for the
/// longer of the two waits. Empty reads and errors pass through untouched.
///
/// The buckets are shared; dropping the reader leaves them, and the source's
/// lifecycle, to their owners.
pub struct ThrottledReader<R, C = SystemClock, S = ThreadSleeper> {
    source:  R,
    local:   Arc<TokenBucket>,
    shared:  Arc<TokenBucket>,
    clock:   C,
    sleeper: S,
}

impl<R> ThrottledReader<R> {
    pub fn new(source: R, local: Arc<TokenBucket>, shared: Arc<TokenBucket>) -> Self {
        Self::with_parts(source, local, shared, SystemClock, ThreadSleeper)
    }
}

impl<R, C, S> ThrottledReader<R, C, S> {
    /// Create a reader with explicit time and sleep sources.
    pub fn with_parts(
        source: R,
        local: Arc<TokenBucket>,
        shared: Arc<TokenBucket>,
        clock: C,
        sleeper: S,
    ) -> Self {
        Self {
            source,
            local,
            shared,
            clock,
            sleeper,
        }
    }

    pub fn local(&self) -> &Arc<TokenBucket> { &self.local }

    pub fn shared(&self) -> &Arc<TokenBucket> { &self.shared }

    pub fn get_ref(&self) -> &R { &self.source }

    pub fn get_mut(&mut self) -> &mut R { &mut self.source }

    pub fn into_inner(self) -> R { self.source }
}

impl<R: Read, C: Clock, S: Sleeper> Read for ThrottledReader<R, C, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        if n == 0 {
            return Ok(n);
        }

        let wait = charge(&self.local, &self.shared, self.clock.now(), n);
        if !wait.is_zero() {
            tracing::trace!(bytes = n, ?wait, "throttling read");
            self.sleeper.sleep(wait);
        }
        Ok(n)
    }
}

/// Debit `bytes` from both buckets and return the longer wait.
pub(crate) fn charge(
    local: &TokenBucket,
    shared: &TokenBucket,
    now: Instant,
    bytes: usize,
) -> Duration {
    let amount = i64::try_from(bytes).unwrap_or(i64::MAX);
    let local_wait = local.take(now, amount);
    let shared_wait = shared.take(now, amount);
    local_wait.max(shared_wait)
}
