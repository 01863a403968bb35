use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::sleep::Sleeper;
use super::state::{PollAttempt, PollTracker, Transition, millis};
use crate::config::AnalyzerConfig;
use crate::provider::{AnalyzedDocument, FailureDetail, OperationReference, OperationStatus, QueryError, StatusSource};

/// Timing and budgets for one poll invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed wait before every status query. No backoff.
    pub interval: Duration,
    /// Hard cap on status queries, failed ones included.
    pub max_attempts: u32,
    /// Consecutive transient query failures tolerated before giving up.
    pub max_transport_retries: u32,
    /// Longest wait a throttling response (`Retry-After`) can ask for.
    pub max_throttle_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            max_attempts: 120,
            max_transport_retries: 3,
            max_throttle_delay: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Total interval time of a run that never sees a terminal status.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl From<&AnalyzerConfig> for PollPolicy {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_poll_attempts,
            max_transport_retries: config.max_transport_retries,
            max_throttle_delay: Duration::from_millis(config.max_throttle_delay_ms),
        }
    }
}

/// How a poll invocation ended when the loop ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Succeeded(AnalyzedDocument),
    /// The provider reported the job failed. Detail is passed through untouched.
    Failed(FailureDetail),
    /// We gave up. The provider never reported a terminal status.
    TimedOut { attempts: u32, waited: Duration },
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("status query failed {consecutive} times in a row: {source}")]
    Transport {
        attempts: u32,
        consecutive: u32,
        #[source]
        source: QueryError,
    },

    #[error("status query failed: {source}")]
    Query {
        attempts: u32,
        #[source]
        source: QueryError,
    },

    #[error("polling cancelled after {attempts} status queries")]
    Cancelled { attempts: u32 },
}

/// Hooks for watching a poll loop from outside (progress display, tests).
pub trait PollObserver: Send + Sync {
    fn on_attempt(&self, _attempt: &PollAttempt, _max_attempts: u32) {}
    fn on_status(&self, _attempt: &PollAttempt, _status: &OperationStatus) {}
    fn on_query_error(&self, _attempt: &PollAttempt, _error: &QueryError) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl PollObserver for NoopObserver {}

/// Queries the provider until the job reaches a terminal state, the attempt
/// budget runs out, or the caller cancels.
pub struct Poller<'a, S, Z> {
    source: &'a S,
    sleeper: &'a Z,
    policy: PollPolicy,
    observer: &'a dyn PollObserver,
}

impl<'a, S, Z> Poller<'a, S, Z>
where
    S: StatusSource + Sync,
    Z: Sleeper,
{
    pub fn new(source: &'a S, sleeper: &'a Z, policy: PollPolicy) -> Self {
        Self {
            source,
            sleeper,
            policy,
            observer: &NoopObserver,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn PollObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Polls `reference` to completion. Queries are strictly sequential and
    /// each one is preceded by a wait. Cancellation is checked during both the
    /// wait and the in-flight query, so it never waits out an interval.
    #[tracing::instrument(
        skip_all,
        fields(operation = %reference, max_attempts = self.policy.max_attempts)
    )]
    pub async fn poll(
        &self,
        reference: OperationReference,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, PollError> {
        let mut tracker = PollTracker::new(self.policy);
        if self.policy.max_attempts == 0 {
            tracing::warn!("attempt budget is zero, no status queries issued");
            return Ok(OperationResult::TimedOut {
                attempts: 0,
                waited: Duration::ZERO,
            });
        }
        let mut delay = self.policy.interval;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempts = tracker.attempts(), "polling cancelled while waiting");
                    return Err(PollError::Cancelled { attempts: tracker.attempts() });
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            let attempt = tracker.begin_attempt(delay);
            self.observer.on_attempt(&attempt, self.policy.max_attempts);

            let queried = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempts = attempt.index, "polling cancelled during status query");
                    return Err(PollError::Cancelled { attempts: attempt.index });
                }
                queried = self.source.fetch_status(&reference) => queried,
            };

            let transition = match queried {
                Ok(status) => {
                    tracing::debug!(attempt = attempt.index, status = status.label(), "status observed");
                    self.observer.on_status(&attempt, &status);
                    tracker.observe(status)
                }
                Err(error) => {
                    tracing::warn!(attempt = attempt.index, error = %error, "status query failed");
                    self.observer.on_query_error(&attempt, &error);
                    tracker.observe_error(error)
                }
            };

            match transition {
                Transition::Continue { delay: next } => delay = next,
                Transition::Complete(result) => {
                    tracing::info!(
                        state = %tracker.state(),
                        attempts = tracker.attempts(),
                        waited_ms = millis(tracker.waited()),
                        "polling finished"
                    );
                    return Ok(result);
                }
                Transition::Abort(error) => {
                    tracing::warn!(attempts = tracker.attempts(), error = %error, "polling aborted");
                    return Err(error);
                }
            }
        }
    }
}
