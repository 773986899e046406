use std::time::Instant;

/// Source of the current instant handed to [`TokenBucket::take`](crate::TokenBucket::take).
///
/// Implementations must be monotonic. A bucket tolerates an instant earlier
/// than the ones it has already seen but never credits tokens for it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic process clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant { (**self).now() }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant { (**self).now() }
}
