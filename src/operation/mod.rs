mod poller;
mod sleep;
mod state;

pub use poller::{NoopObserver, OperationResult, PollError, PollObserver, PollPolicy, Poller};
pub use sleep::{Sleeper, TokioSleeper};
pub use state::{PollAttempt, PollState, PollTracker, Transition, millis};
