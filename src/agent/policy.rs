//! How each call site reacts when its operation fails.
//!
//! Call sites name their policy as a value instead of hiding it in an ad hoc
//! `match` or `let _ =`, so the set of swallowed errors can be read off the
//! code and tested.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Propagate the first error to the caller
    Fatal,

    /// Log the error and carry on without a value
    LogAndContinue,

    /// Try up to `attempts` times, pausing `backoff` between tries, then
    /// log the last error and carry on
    Retry { attempts: u32, backoff: Duration },
}

impl ErrorPolicy {
    /// Run `op` under this policy.
    ///
    /// `Ok(Some(_))` is a success, `Ok(None)` a swallowed failure and
    /// `Err(_)` only ever comes out of [`ErrorPolicy::Fatal`].
    pub async fn run<T, E, F, Fut>(self, what: &str, mut op: F) -> Result<Option<T>, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self {
            ErrorPolicy::Fatal => op().await.map(Some),
            ErrorPolicy::LogAndContinue => match op().await {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("{} failed, continuing: {}", what, e);
                    Ok(None)
                }
            },
            ErrorPolicy::Retry { attempts, backoff } => {
                let attempts = attempts.max(1);
                for attempt in 1..=attempts {
                    match op().await {
                        Ok(value) => return Ok(Some(value)),
                        Err(e) if attempt < attempts => {
                            warn!("{} failed (attempt {}/{}), retrying: {}", what, attempt, attempts, e);
                            sleep(backoff).await;
                        }
                        Err(e) => {
                            warn!("{} failed after {} attempt(s), giving up: {}", what, attempts, e);
                        }
                    }
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn flaky(calls: &AtomicU32, succeed_on: u32) -> Result<u32, String> {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= succeed_on {
            Ok(call)
        } else {
            Err(format!("call {} failed", call))
        }
    }

    #[tokio::test]
    async fn test_fatal_propagates() {
        let calls = AtomicU32::new(0);
        let result = ErrorPolicy::Fatal.run("op", || flaky(&calls, 2)).await;
        assert_eq!(result, Err("call 1 failed".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_log_and_continue_swallows() {
        let calls = AtomicU32::new(0);
        let result = ErrorPolicy::LogAndContinue.run("op", || flaky(&calls, 2)).await;
        assert_eq!(result, Ok(None));

        let result = ErrorPolicy::LogAndContinue.run("op", || flaky(&calls, 2)).await;
        assert_eq!(result, Ok(Some(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let policy = ErrorPolicy::Retry { attempts: 3, backoff: Duration::from_secs(1) };
        let result = policy.run("op", || flaky(&calls, 3)).await;
        assert_eq!(result, Ok(Some(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let policy = ErrorPolicy::Retry { attempts: 2, backoff: Duration::from_millis(10) };
        let result = policy.run("op", || flaky(&calls, 10)).await;
        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
