use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::poller::{OperationResult, PollError, PollPolicy};
use crate::provider::{OperationStatus, QueryError};

/// States of a single poll invocation.
///
/// INIT → RUNNING → (SUCCEEDED | FAILED | TIMED_OUT). There is no way out of a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    Init,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Init => write!(f, "INIT"),
            PollState::Running => write!(f, "RUNNING"),
            PollState::Succeeded => write!(f, "SUCCEEDED"),
            PollState::Failed => write!(f, "FAILED"),
            PollState::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Attempt index (1-based) and the interval time waited before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollAttempt {
    pub index: u32,
    pub waited: Duration,
}

/// What the loop does after an observation.
#[derive(Debug)]
pub enum Transition {
    /// Wait `delay`, then query again.
    Continue { delay: Duration },
    /// A terminal state was reached.
    Complete(OperationResult),
    /// Polling cannot go on; no terminal state was observed.
    Abort(PollError),
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Bookkeeping for one poll invocation.
#[derive(Debug)]
pub struct PollTracker {
    policy: PollPolicy,
    state: PollState,
    attempts: u32,
    consecutive_failures: u32,
    waited: Duration,
}

impl PollTracker {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            state: PollState::Init,
            attempts: 0,
            consecutive_failures: 0,
            waited: Duration::ZERO,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Records that `waited` elapsed and a query is about to go out.
    pub fn begin_attempt(&mut self, waited: Duration) -> PollAttempt {
        debug_assert!(!self.state.is_terminal(), "query issued after {}", self.state);
        debug_assert!(self.attempts < self.policy.max_attempts);
        self.waited = self.waited.saturating_add(waited);
        self.attempts += 1;
        self.state = PollState::Running;
        PollAttempt {
            index: self.attempts,
            waited: self.waited,
        }
    }

    pub fn observe(&mut self, status: OperationStatus) -> Transition {
        self.consecutive_failures = 0;
        match status {
            OperationStatus::Succeeded(document) => {
                self.state = PollState::Succeeded;
                Transition::Complete(OperationResult::Succeeded(document))
            }
            OperationStatus::Failed(detail) => {
                self.state = PollState::Failed;
                Transition::Complete(OperationResult::Failed(detail))
            }
            OperationStatus::Running | OperationStatus::Other(_) => self.keep_going(self.policy.interval),
        }
    }

    pub fn observe_error(&mut self, error: QueryError) -> Transition {
        if !error.is_transient() {
            return Transition::Abort(PollError::Query {
                attempts: self.attempts,
                source: error,
            });
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures > self.policy.max_transport_retries {
            return Transition::Abort(PollError::Transport {
                attempts: self.attempts,
                consecutive: self.consecutive_failures,
                source: error,
            });
        }

        let delay = match error {
            QueryError::Throttled {
                retry_after_secs: Some(secs),
            } => self.throttle_delay(Duration::from_secs(secs)),
            _ => self.policy.interval,
        };
        self.keep_going(delay)
    }

    /// `max(interval, retry_after)`, capped by `max_throttle_delay` and by the
    /// interval time the remaining attempts would have used.
    fn throttle_delay(&self, retry_after: Duration) -> Duration {
        let remaining = self
            .policy
            .interval
            .saturating_mul(self.policy.max_attempts.saturating_sub(self.attempts));
        let cap = self.policy.max_throttle_delay.min(remaining).max(self.policy.interval);
        retry_after.max(self.policy.interval).min(cap)
    }

    fn keep_going(&mut self, delay: Duration) -> Transition {
        if self.attempts >= self.policy.max_attempts {
            self.state = PollState::TimedOut;
            return Transition::Complete(OperationResult::TimedOut {
                attempts: self.attempts,
                waited: self.waited,
            });
        }
        Transition::Continue { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AnalyzedDocument, FailureDetail};

    fn policy(max_attempts: u32, max_transport_retries: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1500),
            max_attempts,
            max_transport_retries,
            max_throttle_delay: Duration::from_secs(30),
        }
    }

    fn unavailable() -> QueryError {
        QueryError::Status {
            status: 503,
            body: String::new(),
        }
    }

    #[test]
    fn first_attempt_moves_init_to_running() {
        let mut tracker = PollTracker::new(policy(3, 1));
        assert_eq!(tracker.state(), PollState::Init);

        let attempt = tracker.begin_attempt(Duration::from_millis(1500));
        assert_eq!(attempt.index, 1);
        assert_eq!(attempt.waited, Duration::from_millis(1500));
        assert_eq!(tracker.state(), PollState::Running);
    }

    #[test]
    fn running_continues_until_budget_then_times_out() {
        let mut tracker = PollTracker::new(policy(2, 1));

        tracker.begin_attempt(Duration::from_secs(1));
        let t = tracker.observe(OperationStatus::Running);
        assert!(matches!(t, Transition::Continue { delay } if delay == Duration::from_millis(1500)));

        tracker.begin_attempt(Duration::from_secs(1));
        let t = tracker.observe(OperationStatus::Other("notStarted".into()));
        match t {
            Transition::Complete(OperationResult::TimedOut { attempts, waited }) => {
                assert_eq!(attempts, 2);
                assert_eq!(waited, Duration::from_secs(2));
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert_eq!(tracker.state(), PollState::TimedOut);
    }

    #[test]
    fn succeeded_and_failed_are_terminal() {
        let mut tracker = PollTracker::new(policy(5, 1));
        tracker.begin_attempt(Duration::ZERO);
        let doc = AnalyzedDocument {
            text: "Page 1: hi".into(),
            page_count: 1,
        };
        let t = tracker.observe(OperationStatus::Succeeded(doc.clone()));
        assert!(matches!(t, Transition::Complete(OperationResult::Succeeded(d)) if d == doc));
        assert!(tracker.state().is_terminal());

        let mut tracker = PollTracker::new(policy(5, 1));
        tracker.begin_attempt(Duration::ZERO);
        let detail = FailureDetail::new(serde_json::json!({"code": "Bad"}));
        let t = tracker.observe(OperationStatus::Failed(detail.clone()));
        assert!(matches!(t, Transition::Complete(OperationResult::Failed(d)) if d == detail));
        assert_eq!(tracker.state(), PollState::Failed);
    }

    #[test]
    fn transient_errors_are_bounded_and_reset_by_a_status() {
        let mut tracker = PollTracker::new(policy(10, 2));

        tracker.begin_attempt(Duration::ZERO);
        assert!(matches!(tracker.observe_error(unavailable()), Transition::Continue { .. }));
        tracker.begin_attempt(Duration::ZERO);
        assert!(matches!(tracker.observe_error(unavailable()), Transition::Continue { .. }));
        tracker.begin_attempt(Duration::ZERO);
        assert!(matches!(tracker.observe(OperationStatus::Running), Transition::Continue { .. }));

        tracker.begin_attempt(Duration::ZERO);
        tracker.observe_error(unavailable());
        tracker.begin_attempt(Duration::ZERO);
        tracker.observe_error(unavailable());
        tracker.begin_attempt(Duration::ZERO);
        match tracker.observe_error(unavailable()) {
            Transition::Abort(PollError::Transport {
                attempts,
                consecutive,
                ..
            }) => {
                assert_eq!(attempts, 6);
                assert_eq!(consecutive, 3);
            }
            other => panic!("expected Transport abort, got {other:?}"),
        }
    }

    #[test]
    fn fatal_error_aborts_immediately() {
        let mut tracker = PollTracker::new(policy(10, 5));
        tracker.begin_attempt(Duration::ZERO);
        let t = tracker.observe_error(QueryError::Status {
            status: 404,
            body: "not found".into(),
        });
        assert!(matches!(t, Transition::Abort(PollError::Query { attempts: 1, .. })));
    }

    #[test]
    fn throttling_stretches_the_next_wait() {
        let mut tracker = PollTracker::new(policy(10, 5));
        tracker.begin_attempt(Duration::ZERO);
        let t = tracker.observe_error(QueryError::Throttled {
            retry_after_secs: Some(10),
        });
        assert!(matches!(t, Transition::Continue { delay } if delay == Duration::from_secs(10)));

        tracker.begin_attempt(Duration::ZERO);
        let t = tracker.observe_error(QueryError::Throttled {
            retry_after_secs: Some(0),
        });
        assert!(matches!(t, Transition::Continue { delay } if delay == Duration::from_millis(1500)));
    }

    #[test]
    fn transient_error_on_last_attempt_times_out() {
        let mut tracker = PollTracker::new(policy(1, 3));
        tracker.begin_attempt(Duration::ZERO);
        let t = tracker.observe_error(unavailable());
        assert!(matches!(
            t,
            Transition::Complete(OperationResult::TimedOut { attempts: 1, .. })
        ));
    }

    #[test]
    fn throttle_delay_is_bounded_by_remaining_budget() {
        let mut tracker = PollTracker::new(policy(4, 5));
        tracker.begin_attempt(Duration::ZERO);
        let t = tracker.observe_error(QueryError::Throttled {
            retry_after_secs: Some(86_400),
        });
        assert!(matches!(t, Transition::Continue { delay } if delay == Duration::from_millis(4500)));

        tracker.begin_attempt(Duration::MAX);
        tracker.begin_attempt(Duration::MAX);
        assert_eq!(tracker.waited(), Duration::MAX);
        let t = tracker.observe_error(QueryError::Throttled {
            retry_after_secs: Some(u64::MAX),
        });
        assert!(matches!(t, Transition::Continue { delay } if delay == Duration::from_millis(1500)));
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn state_display() {
        assert_eq!(PollState::Init.to_string(), "INIT");
        assert_eq!(PollState::Running.to_string(), "RUNNING");
        assert_eq!(PollState::TimedOut.to_string(), "TIMED_OUT");
    }
}
