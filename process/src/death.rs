use crate::event::WaitEvent;
use crate::thread::{ExitReason, ThreadExit};
use crate::{Pid, Tid};
use alloc::collections::VecDeque;
use alloc::sync::Arc;

/// What a dead child leaves behind for its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathEntry {
    pub team: Pid,
    pub thread: Tid,
    /// Process group the team belonged to when it died.
    pub group: Pid,
    pub status: i32,
    pub reason: ExitReason,
    pub signal: u8,
}

impl DeathEntry {
    pub fn new(team: Pid, thread: Tid, group: Pid, exit: ThreadExit) -> Self {
        Self {
            team,
            thread,
            group,
            status: exit.status,
            reason: exit.reason,
            signal: exit.signal,
        }
    }

    /// `(signal << 16) | reason`, the form handed back to waiters.
    pub fn packed_reason(&self) -> i32 {
        ((self.signal as i32) << 16) | self.reason as i32
    }
}

/// Which dead children a lookup may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryFilter {
    Team(Pid),
    Any,
    Group(Pid),
}

impl EntryFilter {
    fn matches(&self, entry: &DeathEntry) -> bool {
        match *self {
            EntryFilter::Team(team) => entry.team == team,
            EntryFilter::Any => true,
            EntryFilter::Group(group) => entry.group == group,
        }
    }
}

/// Dead-children bookkeeping of one team.
///
/// `wait_for_any` counts the waiters that would accept any entry from this
/// ledger: wildcard waits by the owner plus group-wide waits on every group
/// the owner belongs to. An entry is only dropped when a waiter consumes it
/// while that count is zero, so a wildcard waiter cannot be starved by a
/// specific-child waiter taking "its" entry away.
pub struct DeathLedger {
    entries: VecDeque<DeathEntry>,
    pub(crate) wait_for_any: i32,
    pub(crate) waiters: u32,
    /// CPU time folded in from reaped children.
    pub kernel_time: u64,
    pub user_time: u64,
    pub(crate) event: Arc<WaitEvent>,
}

impl DeathLedger {
    pub fn new(event: Arc<WaitEvent>) -> Self {
        Self {
            entries: VecDeque::new(),
            wait_for_any: 0,
            waiters: 0,
            kernel_time: 0,
            user_time: 0,
            event,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DeathEntry> {
        self.entries.iter()
    }

    pub fn wait_for_any(&self) -> i32 {
        self.wait_for_any
    }

    /// Number of threads currently blocked on this ledger.
    pub fn waiters(&self) -> u32 {
        self.waiters
    }

    pub fn event(&self) -> &Arc<WaitEvent> {
        &self.event
    }

    /// Appends an entry, evicting the oldest one once `cap` is exceeded.
    pub(crate) fn push(&mut self, entry: DeathEntry, cap: usize) -> Option<DeathEntry> {
        self.entries.push_back(entry);
        if self.entries.len() > cap.max(1) {
            let evicted = self.entries.pop_front();
            if let Some(old) = &evicted {
                warn!(
                    "[death] ledger full, dropping record of team {} (status {})",
                    old.team, old.status
                );
            }
            return evicted;
        }
        None
    }

    pub(crate) fn position(&self, filter: EntryFilter) -> Option<usize> {
        self.entries.iter().position(|entry| filter.matches(entry))
    }

    pub(crate) fn get(&self, index: usize) -> Option<DeathEntry> {
        self.entries.get(index).copied()
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<DeathEntry> {
        self.entries.remove(index)
    }

    pub(crate) fn adjust_wait_for_any(&mut self, delta: i32) {
        self.wait_for_any += delta;
        assert!(
            self.wait_for_any >= 0,
            "[death] wait_for_any went negative ({})",
            self.wait_for_any
        );
    }

    pub(crate) fn add_times(&mut self, kernel: u64, user: u64) {
        self.kernel_time += kernel;
        self.user_time += user;
    }
}
