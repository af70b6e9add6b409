use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// Blocking primitive supplied by the scheduler.
///
/// The team lock is a spin lock and must never be held across a block, so
/// every sleeper here waits on a [`WaitEvent`] after dropping it.
pub trait WaitQueue: Send + Sync {
    /// Blocks until `condition` holds. Returns `false` if the wait was
    /// interrupted by a signal first; only possible when `interruptible`.
    fn wait_until(&self, condition: &dyn Fn() -> bool, interruptible: bool) -> bool;

    /// Wakes every sleeper so it re-evaluates its condition.
    fn notify_all(&self);
}

/// A sequence counter paired with a wait queue.
///
/// A sleeper samples [`WaitEvent::seq`] while still holding the lock that
/// protects whatever it is waiting on, releases the lock and then calls
/// [`WaitEvent::wait`]. A [`WaitEvent::signal`] that lands in between is
/// not lost because the sequence number has already moved.
pub struct WaitEvent {
    seq: AtomicU64,
    queue: Arc<dyn WaitQueue>,
}

impl WaitEvent {
    pub fn new(queue: Arc<dyn WaitQueue>) -> Arc<Self> {
        Arc::new(Self {
            seq: AtomicU64::new(0),
            queue,
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    pub fn signal(&self) {
        self.seq.fetch_add(1, Ordering::AcqRel);
        self.queue.notify_all();
    }

    /// Sleeps until the event has been signalled since `seen` was sampled.
    pub fn wait(&self, seen: u64, interruptible: bool) -> bool {
        self.queue.wait_until(&|| self.seq() != seen, interruptible)
    }

    /// Sleeps until an arbitrary condition holds, re-checking on every signal.
    pub fn wait_for(&self, condition: &dyn Fn() -> bool, interruptible: bool) -> bool {
        self.queue.wait_until(condition, interruptible)
    }
}
