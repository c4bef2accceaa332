//! Retry-with-backoff, shared by the push channel and the instruction poller.
//!
//! Both loops have the same shape: try something against an unreliable
//! channel, and on failure wait and try again. The push channel runs the whole
//! [`retry`] loop and never yields a value (its attempts end when the
//! connection drops). The instruction poller keeps its own [`Backoff`] instead,
//! because operator input may interrupt its waits but never a fetch in flight.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// How long to wait after the n-th consecutive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

impl RetryPolicy {
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            RetryPolicy::Fixed(delay) => delay,
            RetryPolicy::Exponential { initial, max } => initial
                .checked_mul(2u32.saturating_pow(failures.min(16)))
                .unwrap_or(max)
                .min(max),
        }
    }
}

/// Failure counter driving a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Delay before the next attempt; counts one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay(self.failures);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// One try against a channel.
pub trait Attempt {
    type Output;
    type Error: fmt::Display;

    fn attempt(&mut self) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

    /// Whether the failed attempt got far enough to restart the schedule,
    /// e.g. a connection that was established before it dropped.
    fn progressed(&self, _error: &Self::Error) -> bool {
        false
    }
}

/// Run `attempt` until it yields, sleeping per `backoff` between failures.
pub async fn retry<A: Attempt>(attempt: &mut A, backoff: &mut Backoff, label: &str) -> A::Output {
    loop {
        match attempt.attempt().await {
            Ok(output) => {
                backoff.reset();
                return output;
            }
            Err(e) => {
                if attempt.progressed(&e) {
                    backoff.reset();
                }
                let delay = backoff.next_delay();
                tracing::warn!(
                    channel = label,
                    failures = backoff.failures(),
                    "{e}; retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn exponential_doubles_up_to_max() {
        let policy = RetryPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        let delays: Vec<_> = (0..6).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn backoff_resets() {
        let mut backoff = Backoff::new(RetryPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
        });
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    struct Flaky {
        failures_left: u32,
        calls: u32,
    }

    impl Attempt for Flaky {
        type Output = u32;
        type Error = String;

        async fn attempt(&mut self) -> Result<u32, String> {
            self.calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                Err("not yet".to_string())
            } else {
                Ok(self.calls)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_fixed_schedule_until_success() {
        let mut flaky = Flaky {
            failures_left: 2,
            calls: 0,
        };
        let mut backoff = Backoff::new(RetryPolicy::Fixed(Duration::from_secs(2)));
        let started = Instant::now();

        let calls = retry(&mut flaky, &mut backoff, "test").await;

        assert_eq!(calls, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(backoff.failures(), 0);
    }
}
