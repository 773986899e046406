use std::sync::Arc;
use std::time::Duration;

/// Suspends the calling thread while a throttled read pays its debt.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, wait: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, wait: Duration) { std::thread::sleep(wait) }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, wait: Duration) { (**self).sleep(wait) }
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, wait: Duration) { (**self).sleep(wait) }
}
