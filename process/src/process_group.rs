use crate::event::WaitEvent;
use crate::session::Session;
use crate::Pid;
use alloc::collections::BTreeSet;
use alloc::sync::Arc;

pub struct ProcessGroup {
    pgid: Pid,
    /// Distinguishes this group from an earlier one with the same ID, so a
    /// stale group-wide wait never unregisters from its successor.
    serial: u64,
    session: Pid,
    pub(crate) members: BTreeSet<Pid>,
    pub(crate) wait_for_any: i32,
    pub(crate) waiters: u32,
    pub(crate) event: Arc<WaitEvent>,
}

impl ProcessGroup {
    pub(crate) fn new(pgid: Pid, serial: u64, session: Pid, event: Arc<WaitEvent>) -> Self {
        Self {
            pgid,
            serial,
            session,
            members: BTreeSet::new(),
            wait_for_any: 0,
            waiters: 0,
            event,
        }
    }

    /// Get process group id
    pub fn get_pgid(&self) -> Pid {
        self.pgid
    }

    pub fn get_serial(&self) -> u64 {
        self.serial
    }

    pub fn get_sid(&self) -> Pid {
        self.session
    }

    pub fn members(&self) -> impl Iterator<Item = Pid> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, team: Pid) -> bool {
        self.members.contains(&team)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Group-wide waiters currently registered on this group.
    pub fn wait_for_any(&self) -> i32 {
        self.wait_for_any
    }

    pub fn waiters(&self) -> u32 {
        self.waiters
    }

    pub fn event(&self) -> &Arc<WaitEvent> {
        &self.event
    }
}

/// A group (and possibly its session) unlinked under the team lock. It is
/// handed back so the caller can drop it after releasing the lock.
pub struct FreedGroup {
    pub group: ProcessGroup,
    pub session: Option<Session>,
}
