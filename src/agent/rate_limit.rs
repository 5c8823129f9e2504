use rand::{thread_rng, Rng};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Randomized minimum spacing between tab opens, shared by the whole agent
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,

    /// When the last caller was released. Held across the sleep so that
    /// concurrent callers queue up behind each other.
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            last_request: Mutex::new(None),
        }
    }

    /// Pick a delay uniformly between the bounds
    fn random_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(thread_rng().gen_range(min..=max))
    }

    /// Wait until a randomized delay has passed since the previous call
    pub async fn wait(&self) {
        let mut last_request = self.last_request.lock().await;
        let target = self.random_delay();

        let wait_time = match *last_request {
            Some(last) => target.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting: waiting {} ms", wait_time.as_millis());
            sleep(wait_time).await;
        }

        *last_request = Some(Instant::now());
    }
}
