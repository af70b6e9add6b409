use crate::platform::{AddressSpace, IoContext};
use crate::watch::Watcher;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;
use team_process::{TeamError, TeamResult, WaitEvent};

/// What a team owns beyond its place in the tree.
#[derive(Default)]
pub struct TeamResources {
    // address space related are shared with all threads
    /// The virtual memory address space.
    pub address_space: Option<Arc<dyn AddressSpace>>,
    /// The descriptor table.
    pub io_context: Option<Box<dyn IoContext>>,
    /// Present while a spawner waits for the first image to load.
    pub loading: Option<Arc<LoadingInfo>>,
    pub watchers: Vec<Watcher>,
    /// Present while the destructor waits for the remaining threads.
    pub death: Option<Arc<DeathCounter>>,
}

/// Rendezvous between a spawner and the new team's main thread.
pub struct LoadingInfo {
    done: AtomicBool,
    result: Mutex<TeamResult<()>>,
    /// Why loading failed, reported once the team is gone.
    failure: Mutex<Option<TeamError>>,
    event: Arc<WaitEvent>,
}

impl LoadingInfo {
    pub fn new(event: Arc<WaitEvent>) -> Self {
        Self {
            done: AtomicBool::new(false),
            result: Mutex::new(Err(TeamError::Aborted)),
            failure: Mutex::new(None),
            event,
        }
    }

    pub fn record_failure(&self, err: TeamError) {
        self.failure.lock().get_or_insert(err);
    }

    pub fn failure(&self) -> Option<TeamError> {
        *self.failure.lock()
    }

    pub fn complete(&self, result: TeamResult<()>) {
        *self.result.lock() = result;
        self.done.store(true, Ordering::Release);
        self.event.signal();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Blocks until [`LoadingInfo::complete`]; an interruption abandons the
    /// wait but not the team.
    pub fn wait(&self) -> TeamResult<()> {
        if !self.event.wait_for(&|| self.is_done(), true) {
            return Err(TeamError::Interrupted);
        }
        *self.result.lock()
    }
}

/// Counts the threads a dying team still has to get rid of.
pub struct DeathCounter {
    remaining: AtomicUsize,
    event: Arc<WaitEvent>,
}

impl DeathCounter {
    pub fn new(remaining: usize, event: Arc<WaitEvent>) -> Self {
        Self {
            remaining: AtomicUsize::new(remaining),
            event,
        }
    }

    pub fn thread_gone(&self) {
        self.remaining.fetch_sub(1, Ordering::AcqRel);
        self.event.signal();
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn wait_all(&self) {
        self.event.wait_for(&|| self.remaining() == 0, false);
    }
}
