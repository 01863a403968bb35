use std::future::Future;
use std::time::Duration;

/// Suspends the poll loop between status queries.
///
/// Production code uses [`TokioSleeper`]; tests substitute an implementation
/// that returns immediately so long timeouts run in test time.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
