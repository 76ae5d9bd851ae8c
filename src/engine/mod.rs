//! Core engine: the poll → retry → diff → publish loop.

pub mod detector;
pub mod poller;
pub mod scheduler;
pub mod shutdown;

pub use detector::ChangeDetector;
pub use poller::{Backoff, RetryingPoller, TokioBackoff};
pub use scheduler::{activate, Activation, PollScheduler, SchedulerHandle};
pub use shutdown::{Shutdown, ShutdownTrigger};
