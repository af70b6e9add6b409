use super::lock;
use super::misc::{FaultPoint, Faults};
use crate::platform::{Scheduler, ThreadEntry};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use std::vec::Vec;
use team_process::{Signal, TeamError, TeamResult, Tid, WaitQueue};

/// Blocked host threads re-check for signals this often.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

thread_local! {
    static CURRENT: Cell<Tid> = const { Cell::new(0) };
}

/// Unwind payload of a thread that called `terminate_current`.
struct Terminated;

#[derive(Default)]
struct ThreadControl {
    /// Sticky: a killed thread fails every interruptible wait.
    killed: AtomicBool,
    /// One-shot interruption.
    interrupted: AtomicBool,
    signals: Mutex<Vec<Signal>>,
}

impl ThreadControl {
    fn take_interrupt(&self) -> bool {
        self.killed.load(Ordering::Acquire) || self.interrupted.swap(false, Ordering::AcqRel)
    }
}

#[derive(Default)]
struct Controls {
    threads: Mutex<BTreeMap<Tid, Arc<ThreadControl>>>,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Controls {
    fn get(&self, tid: Tid) -> Arc<ThreadControl> {
        lock(&self.threads).entry(tid).or_default().clone()
    }

    fn current(&self) -> Arc<ThreadControl> {
        self.get(CURRENT.with(Cell::get))
    }

    fn wake(&self) {
        let _guard = lock(&self.lock);
        self.cond.notify_all();
    }
}

pub struct HostScheduler {
    controls: Arc<Controls>,
    faults: Arc<Faults>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HostScheduler {
    pub fn new(faults: Arc<Faults>) -> Arc<Self> {
        Arc::new(Self {
            controls: Arc::new(Controls::default()),
            faults,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Binds the calling host thread to kernel thread `tid`.
    pub fn adopt_current(&self, tid: Tid) {
        CURRENT.with(|current| current.set(tid));
    }

    /// Cuts the next interruptible wait of `tid` short.
    pub fn interrupt(&self, tid: Tid) {
        self.controls.get(tid).interrupted.store(true, Ordering::Release);
        self.controls.wake();
    }

    pub fn is_killed(&self, tid: Tid) -> bool {
        self.controls.get(tid).killed.load(Ordering::Acquire)
    }

    pub fn current_killed(&self) -> bool {
        self.controls.current().killed.load(Ordering::Acquire)
    }

    pub fn received(&self, tid: Tid) -> Vec<Signal> {
        lock(&self.controls.get(tid).signals).clone()
    }

    /// Parks the calling thread until it is killed, like a program blocked
    /// in user space.
    pub fn wait_until_killed(&self) {
        let me = self.controls.current();
        let mut guard = lock(&self.controls.lock);
        while !me.killed.load(Ordering::Acquire) {
            guard = match self.controls.cond.wait_timeout(guard, POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Joins every thread spawned so far.
    pub fn join_all(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = lock(&self.handles).drain(..).collect();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

impl Scheduler for HostScheduler {
    fn current_thread(&self) -> Tid {
        CURRENT.with(Cell::get)
    }

    fn spawn(&self, tid: Tid, name: &str, _priority: i32, entry: ThreadEntry) -> TeamResult<()> {
        if self.faults.take(FaultPoint::Spawn) {
            return Err(TeamError::NoMemory);
        }
        let controls = self.controls.clone();
        let handle = std::thread::Builder::new()
            .name(std::format!("{}#{}", name, tid))
            .spawn(move || {
                CURRENT.with(|current| current.set(tid));
                if let Err(payload) = catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<Terminated>() {
                        error!("[host] thread {} panicked", tid);
                    }
                }
                lock(&controls.threads).remove(&tid);
            })
            .map_err(|_| TeamError::NoMemory)?;
        lock(&self.handles).push(handle);
        Ok(())
    }

    fn send_signal(&self, tid: Tid, signal: Signal) {
        let control = self.controls.get(tid);
        lock(&control.signals).push(signal);
        if matches!(signal, Signal::Kill | Signal::KillThread) {
            control.killed.store(true, Ordering::Release);
        }
        self.controls.wake();
    }

    fn new_wait_queue(&self) -> Arc<dyn WaitQueue> {
        Arc::new(HostWaitQueue {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            controls: self.controls.clone(),
        })
    }

    fn terminate_current(&self) -> ! {
        resume_unwind(std::boxed::Box::new(Terminated))
    }
}

pub struct HostWaitQueue {
    lock: Mutex<()>,
    cond: Condvar,
    controls: Arc<Controls>,
}

impl WaitQueue for HostWaitQueue {
    fn wait_until(&self, condition: &dyn Fn() -> bool, interruptible: bool) -> bool {
        let me = self.controls.current();
        let mut guard = lock(&self.lock);
        loop {
            if condition() {
                return true;
            }
            if interruptible && me.take_interrupt() {
                return false;
            }
            guard = match self.cond.wait_timeout(guard, POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn notify_all(&self) {
        let _guard = lock(&self.lock);
        self.cond.notify_all();
    }
}
