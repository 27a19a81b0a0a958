use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::utils::clock::Clock;

/// Republishes the displayed elapsed seconds while the timer runs. It only ever reads the clock,
/// so missed or late ticks never change what gets stored.
pub struct Ticker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(
        clock: Arc<dyn Clock>,
        accumulated: Duration,
        run_started: Instant,
        interval: Duration,
        elapsed: Arc<watch::Sender<u64>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(interval));
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            return;
                        }
                        let total = accumulated
                            + clock.instant().saturating_duration_since(run_started);
                        let seconds = total.as_secs();
                        trace!("Tick {seconds}s");
                        elapsed.send_if_modified(|current| {
                            let changed = *current != seconds;
                            *current = seconds;
                            changed
                        });
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::watch;

    use super::Ticker;
    use crate::utils::clock::{testing::ManualClock, Clock};

    #[tokio::test(start_paused = true)]
    async fn publishes_accumulated_plus_running_segment() {
        let clock = ManualClock::new();
        let (sender, elapsed) = watch::channel(0);
        let ticker = Ticker::spawn(
            Arc::new(clock.clone()),
            Duration::from_secs(40),
            clock.instant(),
            Duration::from_millis(200),
            Arc::new(sender),
        );

        clock.advance(Duration::from_millis(2500));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(*elapsed.borrow(), 42);
        assert!(!ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_ticker_finishes() {
        let clock = ManualClock::new();
        let (sender, elapsed) = watch::channel(0);
        let ticker = Ticker::spawn(
            Arc::new(clock.clone()),
            Duration::ZERO,
            clock.instant(),
            Duration::from_millis(200),
            Arc::new(sender),
        );

        ticker.shutdown.cancel();
        clock.advance(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(ticker.is_finished());
        assert_eq!(*elapsed.borrow(), 0);
    }
}
