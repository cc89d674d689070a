//! One-shot and periodic software timers.
//!
//! Each [`SoftTimer`] owns a worker thread that sleeps until the armed
//! deadline and then runs the callback. The callback runs without any timer
//! lock held, so it may start, stop or re-period its own timer.
//!
//! ## Lock order
//!
//! Callers may hold their own locks while calling [`SoftTimer::start`] or
//! [`SoftTimer::change_period`]. [`SoftTimer::stop`] waits for an in-flight
//! callback to finish and must not be called while holding a lock that the
//! callback acquires.

use std::{
    fmt, io,
    sync::Arc,
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::metrics::TimerMetrics;

/// Callback executed on the timer thread.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Whether a timer re-arms itself after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot,
    Periodic,
}

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("timer period must be non-zero")]
    ZeroPeriod,
    #[error("timer has been shut down")]
    ShutDown,
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] io::Error),
}

struct TimerState {
    period: Duration,
    deadline: Option<Instant>,
    firing: bool,
    shutdown: bool,
}

struct Shared {
    name: &'static str,
    mode: TimerMode,
    state: Mutex<TimerState>,
    cond: Condvar,
    callback: TimerCallback,
    metrics: TimerMetrics,
}

/// A software timer driven by its own thread.
pub struct SoftTimer {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl fmt::Debug for SoftTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SoftTimer")
            .field("name", &self.shared.name)
            .field("mode", &self.shared.mode)
            .field("period", &state.period)
            .field("active", &state.deadline.is_some())
            .finish()
    }
}

impl SoftTimer {
    /// Create a dormant timer. Nothing runs until [`SoftTimer::start`].
    pub fn new(
        name: &'static str,
        mode: TimerMode,
        period: Duration,
        callback: TimerCallback,
    ) -> Result<Self, TimerError> {
        if period.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }

        let shared = Arc::new(Shared {
            name,
            mode,
            state: Mutex::new(TimerState {
                period,
                deadline: None,
                firing: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
            callback,
            metrics: TimerMetrics::new(name),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(format!("timer-{name}"))
            .spawn(move || run(worker_shared))?;
        let worker_id = worker.thread().id();

        debug!(timer = name, ?mode, ?period, "Timer created");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn mode(&self) -> TimerMode {
        self.shared.mode
    }

    pub fn period(&self) -> Duration {
        self.shared.state.lock().period
    }

    /// True while a deadline is armed.
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Arm the timer one period from now. Restarts an already armed timer.
    pub fn start(&self) -> Result<(), TimerError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(TimerError::ShutDown);
        }
        state.deadline = Some(Instant::now() + state.period);
        self.shared.metrics.inc_starts();
        trace!(timer = self.shared.name, period = ?state.period, "Timer armed");
        self.shared.cond.notify_all();
        Ok(())
    }

    /// Alias for [`SoftTimer::start`]: push the deadline one period out.
    pub fn reset(&self) -> Result<(), TimerError> {
        self.start()
    }

    /// Set a new period and arm the timer with it.
    pub fn change_period(&self, period: Duration) -> Result<(), TimerError> {
        if period.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return Err(TimerError::ShutDown);
            }
            state.period = period;
        }
        self.start()
    }

    /// Disarm the timer.
    ///
    /// When called from any thread other than the timer's own, also waits for
    /// an in-flight callback to return. After `stop` returns the callback will
    /// not run again until the timer is restarted.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        let was_active = state.deadline.take().is_some();
        if was_active {
            self.shared.metrics.inc_stops();
            trace!(timer = self.shared.name, "Timer stopped");
        }
        self.shared.cond.notify_all();

        if thread::current().id() != self.worker_id {
            wait_idle(&self.shared, &mut state);
        }
    }

    /// Disarm and terminate the worker thread.
    ///
    /// Joins the worker unless called from within the callback. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.deadline = None;
            self.shared.cond.notify_all();
        }

        if thread::current().id() == self.worker_id {
            // The worker exits on its own once the callback returns.
            self.worker.lock().take();
            return;
        }

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!(timer = self.shared.name, "Timer thread panicked");
            }
        }
        debug!(timer = self.shared.name, "Timer shut down");
    }
}

impl Drop for SoftTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wait_idle(shared: &Shared, state: &mut MutexGuard<'_, TimerState>) {
    while state.firing {
        shared.cond.wait(state);
    }
}

fn run(shared: Arc<Shared>) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        let Some(deadline) = state.deadline else {
            shared.cond.wait(&mut state);
            continue;
        };

        let now = Instant::now();
        if now < deadline {
            shared.cond.wait_until(&mut state, deadline);
            continue;
        }

        state.deadline = match shared.mode {
            TimerMode::OneShot => None,
            TimerMode::Periodic => Some(now + state.period),
        };
        state.firing = true;
        shared.metrics.inc_fires();

        MutexGuard::unlocked(&mut state, || (shared.callback)());

        state.firing = false;
        shared.cond.notify_all();
    }
    trace!(timer = shared.name, "Timer thread exiting");
}
