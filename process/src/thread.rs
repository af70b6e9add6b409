use crate::{Pid, Tid};
use alloc::collections::BTreeMap;
use alloc::string::String;
use core::sync::atomic::{AtomicI32, Ordering};
use num_enum::TryFromPrimitive;

/// Why a thread stopped running.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum ExitReason {
    /// Returned from its entry point or called an exit function.
    Exit = 1,
    /// Killed by a signal.
    Interrupted = 2,
}

/// The few signals the team layer sends on its own.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Signal {
    /// A child team died.
    Child = 5,
    /// Kill the whole team.
    Kill = 9,
    /// Kill a single thread.
    KillThread = 21,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadExit {
    pub status: i32,
    pub reason: ExitReason,
    /// Signal number for [`ExitReason::Interrupted`], otherwise 0.
    pub signal: u8,
}

impl ThreadExit {
    pub const fn normal(status: i32) -> Self {
        Self {
            status,
            reason: ExitReason::Exit,
            signal: 0,
        }
    }

    pub const fn killed(signal: Signal) -> Self {
        Self {
            status: 0,
            reason: ExitReason::Interrupted,
            signal: signal as u8,
        }
    }
}

/// Per-thread state the team layer cares about.
#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub id: Tid,
    pub team: Pid,
    pub name: String,
    pub priority: i32,
    pub kernel_time: u64,
    pub user_time: u64,
    /// Set once the exit status is decided (exit_team, kill); a plain return
    /// from the entry point only fills it if nothing else did first.
    pub exit: Option<ThreadExit>,
    pub user_stack_area: Option<i32>,
    pub user_stack_base: usize,
    pub user_stack_size: usize,
}

impl ThreadRecord {
    pub fn new(id: Tid, team: Pid, name: &str, priority: i32) -> Self {
        Self {
            id,
            team,
            name: String::from(name),
            priority,
            kernel_time: 0,
            user_time: 0,
            exit: None,
            user_stack_area: None,
            user_stack_base: 0,
            user_stack_size: 0,
        }
    }
}

/// All live threads, keyed by ID. Guarded by the thread lock, which nests
/// inside the team lock.
#[derive(Default)]
pub struct ThreadTable {
    threads: BTreeMap<Tid, ThreadRecord>,
}

impl ThreadTable {
    pub const fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: ThreadRecord) {
        if self.threads.contains_key(&record.id) {
            panic!("[thread] thread with id {} already exists", record.id);
        }
        self.threads.insert(record.id, record);
    }

    pub fn remove(&mut self, tid: Tid) -> Option<ThreadRecord> {
        self.threads.remove(&tid)
    }

    pub fn get(&self, tid: Tid) -> Option<&ThreadRecord> {
        self.threads.get(&tid)
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut ThreadRecord> {
        self.threads.get_mut(&tid)
    }

    pub fn team_of(&self, tid: Tid) -> Option<Pid> {
        self.threads.get(&tid).map(|record| record.team)
    }

    /// Records the exit status unless one was already decided.
    pub fn set_exit_once(&mut self, tid: Tid, exit: ThreadExit) -> bool {
        match self.threads.get_mut(&tid) {
            Some(record) if record.exit.is_none() => {
                record.exit = Some(exit);
                true
            }
            _ => false,
        }
    }

    pub fn charge(&mut self, tid: Tid, kernel: u64, user: u64) -> bool {
        match self.threads.get_mut(&tid) {
            Some(record) => {
                record.kernel_time += kernel;
                record.user_time += user;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

/// Hands out team/thread IDs. IDs are never reused.
pub struct IdAllocator {
    next: AtomicI32,
}

impl IdAllocator {
    pub const fn new(first: Pid) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    pub fn allocate(&self) -> Pid {
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    pub fn peek(&self) -> Pid {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}
