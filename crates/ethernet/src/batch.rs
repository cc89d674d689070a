//! Debounced event batching.
//!
//! When enabled, substrate events are queued and drained together once the
//! queue has been quiet for the batch window. A full queue never drops an
//! event: the backlog and the new event are processed inline instead.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use ethmgr_net_events::NetEvent;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::{
    EthError, EthResult, EthernetManager,
    config::{BatchConfig, DEFAULT_BATCH_CAPACITY, DEFAULT_BATCH_WINDOW},
    manager::Inner,
    supervisor::TimerKind,
};

#[derive(Debug)]
pub(crate) struct EventBatcher {
    enabled: AtomicBool,
    capacity: AtomicUsize,
    window_ms: AtomicU64,
    queue: Mutex<VecDeque<NetEvent>>,
    /// Serializes drains so batched events keep their arrival order.
    drain_lock: Mutex<()>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for EventBatcher {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            capacity: AtomicUsize::new(DEFAULT_BATCH_CAPACITY),
            window_ms: AtomicU64::new(millis(DEFAULT_BATCH_WINDOW)),
            queue: Mutex::new(VecDeque::with_capacity(DEFAULT_BATCH_CAPACITY)),
            drain_lock: Mutex::new(()),
        }
    }
}

impl EventBatcher {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn configure(&self, config: &BatchConfig) {
        self.capacity.store(config.capacity, Ordering::Relaxed);
        self.window_ms
            .store(millis(config.window), Ordering::Relaxed);
        self.enabled.store(config.enabled, Ordering::Release);
    }

    pub(crate) fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Queue `event`, handing it back if the queue is full.
    pub(crate) fn push(&self, event: NetEvent) -> Result<(), NetEvent> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity() {
            return Err(event);
        }
        queue.push_back(event);
        Ok(())
    }

    pub(crate) fn pop(&self) -> Option<NetEvent> {
        self.queue.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Disable batching and drop anything still queued.
    pub(crate) fn reset(&self) {
        self.configure(&BatchConfig::default());
        self.queue.lock().clear();
    }
}

impl Inner {
    pub(crate) fn enqueue_event(&self, event: NetEvent) {
        match self.batcher.push(event) {
            Ok(()) => {
                trace!(queued = self.batcher.len(), "Event batched");
                if let Err(error) = self.arm_timer(TimerKind::Batch, self.batcher.window()) {
                    warn!(%error, "Batch timer unavailable, draining now");
                    self.drain_batch();
                }
            }
            Err(event) => {
                warn!("Event queue full, processing immediately");
                let _drain = self.batcher.drain_lock.lock();
                self.drain_queued();
                self.process_event(event);
            }
        }
    }

    /// Process every queued event in arrival order.
    pub(crate) fn drain_batch(&self) {
        let _drain = self.batcher.drain_lock.lock();
        self.drain_queued();
    }

    fn drain_queued(&self) {
        let mut drained = 0usize;
        while let Some(event) = self.batcher.pop() {
            self.process_event(event);
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "Event batch processed");
        }
    }
}

impl EthernetManager {
    /// Tune event batching and the quick lock budget.
    ///
    /// Disabling batching flushes anything still queued.
    pub fn configure_performance(
        &self,
        batching: bool,
        quick_lock_timeout: Duration,
        queue_capacity: usize,
    ) -> EthResult<()> {
        let inner = &self.inner;
        if quick_lock_timeout.is_zero() || queue_capacity == 0 {
            inner.last_error.set(EthError::InvalidParameter);
            return Err(EthError::InvalidParameter);
        }

        inner.budgets.set_quick(quick_lock_timeout);
        inner.batcher.configure(&BatchConfig {
            enabled: batching,
            window: inner.batcher.window(),
            capacity: queue_capacity,
        });
        if !batching {
            inner.stop_timer(TimerKind::Batch);
            inner.drain_batch();
        }

        info!(
            batching,
            quick_lock_timeout = ?quick_lock_timeout,
            queue_capacity,
            "Performance configured"
        );
        Ok(())
    }
}
