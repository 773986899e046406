use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use sluice_bucket::TokenBucket;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep, sleep};

use crate::reader::charge;

/// Async counterpart of [`ThrottledReader`](crate::ThrottledReader).
///
/// Bytes produced by a read that ends in debt are held back until the
/// longer of the two bucket waits has elapsed on the tokio timer.
pub struct AsyncThrottledReader<R> {
    source:   R,
    local:    Arc<TokenBucket>,
    shared:   Arc<TokenBucket>,
    withheld: Vec<u8>,
    /// Bytes of `withheld` already handed to the caller.
    released: usize,
    delay:    Option<Pin<Box<Sleep>>>,
}

impl<R> AsyncThrottledReader<R> {
    pub fn new(source: R, local: Arc<TokenBucket>, shared: Arc<TokenBucket>) -> Self {
        Self {
            source,
            local,
            shared,
            withheld: Vec::new(),
            released: 0,
            delay: None,
        }
    }

    pub fn local(&self) -> &Arc<TokenBucket> { &self.local }

    pub fn shared(&self) -> &Arc<TokenBucket> { &self.shared }

    pub fn get_ref(&self) -> &R { &self.source }

    /// Unwrap the source. Bytes still held back are discarded.
    pub fn into_inner(self) -> R { self.source }
}

impl<R: AsyncRead + Unpin> AsyncRead for AsyncThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if let Some(delay) = this.delay.as_mut() {
                ready!(delay.as_mut().poll(cx));
                this.delay = None;
            }

            if this.released < this.withheld.len() {
                let pending = &this.withheld[this.released..];
                let n = pending.len().min(buf.remaining());
                buf.put_slice(&pending[..n]);
                this.released += n;
                if this.released == this.withheld.len() {
                    this.withheld.clear();
                    this.released = 0;
                }
                return Poll::Ready(Ok(()));
            }

            let before = buf.filled().len();
            ready!(Pin::new(&mut this.source).poll_read(cx, buf))?;
            let n = buf.filled().len() - before;
            if n == 0 {
                return Poll::Ready(Ok(()));
            }

            let now = Instant::now().into_std();
            let wait = charge(&this.local, &this.shared, now, n);
            if wait.is_zero() {
                return Poll::Ready(Ok(()));
            }

            tracing::trace!(bytes = n, ?wait, "throttling async read");
            this.withheld.extend_from_slice(&buf.filled()[before..]);
            buf.set_filled(before);
            this.delay = Some(Box::pin(sleep(wait)));
        }
    }
}
