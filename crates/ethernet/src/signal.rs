use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use web_time::Instant;

/// The "connected" bit waiters block on.
///
/// Reads are a single atomic load; waits are bounded.
#[derive(Debug, Default)]
pub(crate) struct ConnectedSignal {
    flag: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl ConnectedSignal {
    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self) {
        self.flag.store(true, Ordering::Release);
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Block up to `timeout` for the bit. Returns whether it is set.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.cond.wait_for(&mut guard, deadline - now);
        }
        self.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_wait_times_out_when_unset() {
        let signal = ConnectedSignal::default();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_returns_immediately_when_set() {
        let signal = ConnectedSignal::default();
        signal.set();
        assert!(signal.wait(Duration::from_secs(10)));
        signal.clear();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_set_wakes_waiter() {
        let signal = Arc::new(ConnectedSignal::default());
        let setter = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        assert!(signal.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
