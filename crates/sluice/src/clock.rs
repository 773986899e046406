use std::time::Instant;

use sluice_bucket::Clock;

/// Clock read through tokio's timer.
///
/// Matches the process clock unless the runtime has paused time, in which
/// case it follows the paused clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant { tokio::time::Instant::now().into_std() }
}
