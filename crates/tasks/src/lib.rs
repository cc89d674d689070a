//! Software timers.
//!
//! [`SoftTimer`] provides one-shot and periodic timers backed by a dedicated
//! thread, with start, stop, reset and period changes from any thread
//! including the timer's own callback.

mod metrics;
mod timer;

pub use timer::{SoftTimer, TimerCallback, TimerError, TimerMode};
