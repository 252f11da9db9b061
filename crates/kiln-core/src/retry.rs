//! Bounded polling
//!
//! Both the receipt wait and the verification status loop are "call, inspect,
//! maybe sleep, repeat" with a hard attempt cap. [`poll`] owns that loop so
//! the callers only decide what a terminal answer looks like. The delay goes
//! through a [`Sleeper`] so tests run without real time passing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Interval and attempt cap for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on time spent sleeping between attempts
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Done(T),
    Continue,
}

/// How a polling loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Done { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Done { attempts, .. }
            | PollOutcome::Exhausted { attempts }
            | PollOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

/// Delay mechanism between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

/// Shared sleeper handle
pub type SharedSleeper = Arc<dyn Sleeper>;

/// Run `attempt` until it yields [`Step::Done`], the attempt cap is reached,
/// an attempt fails, or `cancel` fires.
///
/// Sleeps `policy.interval` between attempts, never after the last one.
/// Cancellation interrupts both an in-flight attempt and the sleep.
pub async fn poll<T, E, F, Fut>(
    policy: PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Step<T>, E>>,
{
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled { attempts });
        }

        attempts += 1;
        let step = tokio::select! {
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled { attempts }),
            step = attempt(attempts) => step?,
        };

        if let Step::Done(value) = step {
            return Ok(PollOutcome::Done { value, attempts });
        }

        if attempts < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled { attempts }),
                _ = sleeper.sleep(policy.interval) => {}
            }
        }
    }

    Ok(PollOutcome::Exhausted { attempts })
}
