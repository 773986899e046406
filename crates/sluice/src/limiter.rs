use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use sluice_bucket::{Clock, TokenBucket};
use tokio::io::AsyncRead;

use crate::async_reader::AsyncThrottledReader;
use crate::clock::TokioClock;
use crate::config::{BandwidthConfig, LimitSpec, invalid};
use crate::error::Result;
use crate::reader::ThrottledReader;
use crate::sleep::ThreadSleeper;

/// Factory for throttled readers sharing one global bucket.
///
/// Every wrapped stream gets a fresh local bucket built from the current
/// local limit. [`reload`](Self::reload) pushes new limits into the shared
/// bucket and into the local bucket of every reader still alive.
///
/// Bucket origins and the sync readers' instants both come from
/// [`TokioClock`].
#[derive(Debug)]
pub struct Limiter {
    shared: Arc<TokenBucket>,
    local:  Mutex<LocalBuckets>,
}

#[derive(Debug)]
struct LocalBuckets {
    spec: LimitSpec,
    live: Vec<Weak<TokenBucket>>,
}

impl Limiter {
    pub fn new(config: &BandwidthConfig) -> Result<Self> {
        config.validate()?;
        let shared = config.shared.build(TokioClock.now()).map_err(invalid("shared"))?;

        Ok(Self {
            shared: Arc::new(shared),
            local:  Mutex::new(LocalBuckets {
                spec: config.local,
                live: Vec::new(),
            }),
        })
    }

    pub fn wrap<R: Read>(&self, source: R) -> Result<ThrottledReader<R, TokioClock>> {
        let local = self.local_bucket(TokioClock.now())?;
        Ok(ThrottledReader::with_parts(
            source,
            local,
            Arc::clone(&self.shared),
            TokioClock,
            ThreadSleeper,
        ))
    }

    pub fn wrap_async<R: AsyncRead + Unpin>(&self, source: R) -> Result<AsyncThrottledReader<R>> {
        let local = self.local_bucket(TokioClock.now())?;
        Ok(AsyncThrottledReader::new(source, local, Arc::clone(&self.shared)))
    }

    /// Apply new limits to the shared bucket, to every live local bucket and
    /// to readers wrapped from now on.
    ///
    /// The whole config is validated before any bucket changes.
    pub fn reload(&self, config: &BandwidthConfig) -> Result<()> {
        config.validate()?;

        config.shared.apply(&self.shared).map_err(invalid("shared"))?;

        let mut local = self.lock();
        local.spec = config.local;
        local.live.retain(|bucket| bucket.strong_count() > 0);
        for bucket in local.live.iter().filter_map(Weak::upgrade) {
            config.local.apply(&bucket).map_err(invalid("local"))?;
        }

        tracing::debug!(
            local_rate = config.local.rate,
            shared_rate = config.shared.rate,
            readers = local.live.len(),
            "bandwidth limits reloaded"
        );
        Ok(())
    }

    pub fn shared(&self) -> &Arc<TokenBucket> { &self.shared }

    /// Number of wrapped readers whose local bucket is still alive.
    pub fn live_readers(&self) -> usize {
        self.lock()
            .live
            .iter()
            .filter(|bucket| bucket.strong_count() > 0)
            .count()
    }

    fn local_bucket(&self, now: Instant) -> Result<Arc<TokenBucket>> {
        let mut local = self.lock();
        let bucket = Arc::new(local.spec.build(now).map_err(invalid("local"))?);
        local.live.retain(|bucket| bucket.strong_count() > 0);
        local.live.push(Arc::downgrade(&bucket));
        Ok(bucket)
    }

    fn lock(&self) -> MutexGuard<'_, LocalBuckets> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::time::Duration;

    fn config(local_rate: f64, shared_rate: f64) -> BandwidthConfig {
        BandwidthConfig::new(
            LimitSpec::new(local_rate, 100),
            LimitSpec::new(shared_rate, 1000),
        )
    }

    #[test]
    fn test_wrap_pairs_local_with_shared() {
        let limiter = Limiter::new(&config(10.0, 100.0)).unwrap();
        let first = limiter.wrap(&b""[..]).unwrap();
        let second = limiter.wrap(&b""[..]).unwrap();

        assert!(Arc::ptr_eq(first.shared(), limiter.shared()));
        assert!(Arc::ptr_eq(second.shared(), limiter.shared()));
        assert!(!Arc::ptr_eq(first.local(), second.local()));
        assert_eq!(first.local().capacity(), 100);
    }

    #[test]
    fn test_live_readers_tracks_drops() {
        let limiter = Limiter::new(&config(10.0, 100.0)).unwrap();
        let first = limiter.wrap(&b""[..]).unwrap();
        let second = limiter.wrap(&b""[..]).unwrap();
        assert_eq!(limiter.live_readers(), 2);

        drop(first);
        assert_eq!(limiter.live_readers(), 1);
        drop(second);
        assert_eq!(limiter.live_readers(), 0);
    }

    #[test]
    fn test_reload_updates_live_and_future_buckets() {
        let limiter = Limiter::new(&config(10.0, 100.0)).unwrap();
        let existing = limiter.wrap(&b""[..]).unwrap();

        limiter.reload(&config(4.0, 50.0)).unwrap();

        assert_eq!(existing.local().fill_interval(), Duration::from_millis(250));
        assert_eq!(limiter.shared().fill_interval(), Duration::from_millis(20));

        let fresh = limiter.wrap(&b""[..]).unwrap();
        assert_eq!(fresh.local().fill_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_reload_rejects_invalid_config_untouched() {
        let limiter = Limiter::new(&config(10.0, 100.0)).unwrap();
        let existing = limiter.wrap(&b""[..]).unwrap();

        let err = limiter.reload(&config(10.0, -1.0)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { section: "shared", .. }));
        assert_eq!(limiter.shared().fill_interval(), Duration::from_millis(10));
        assert_eq!(existing.local().fill_interval(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_reader_follows_paused_clock() {
        let limiter = Limiter::new(&config(1.0, 1000.0)).unwrap();
        let mut reader = limiter.wrap(&b"x"[..]).unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);

        // A full bucket of 100 paid for the byte without any debt.
        let now = TokioClock.now();
        assert_eq!(reader.local().take(now, 99), Duration::ZERO);
        assert_eq!(reader.local().take(now, 1), Duration::from_secs(1));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Limiter::new(&config(f64::NAN, 100.0)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { section: "local", .. }));
    }
}
