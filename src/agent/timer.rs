use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Fires a callback immediately and then once per period.
///
/// Each tick runs as its own task, so a slow tick never delays the next one.
pub struct RepeatingTimer;

/// Cancels the timer when dropped
#[derive(Debug)]
pub struct TimerHandle {
    ticker: JoinHandle<()>,
}

impl RepeatingTimer {
    pub fn start<F, Fut>(period: Duration, mut tick: F) -> TimerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticker = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                tokio::spawn(tick());
            }
        });

        TimerHandle { ticker }
    }
}

impl TimerHandle {
    /// Stop scheduling ticks. Ticks already running are left alone.
    pub fn cancel(self) {
        self.ticker.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}
