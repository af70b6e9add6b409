use crate::manager::TeamManager;
use bitflags::bitflags;
use team_process::{DeathEntry, Interest, Pid, TeamError, TeamResult, Tid, WaitTarget};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WaitFlags: u32 {
        /// Fail with `WouldBlock` instead of sleeping.
        const NO_HANG = 0x1;
    }
}

/// What a reaped child reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub thread: Tid,
    pub status: i32,
    /// `(signal << 16) | reason`.
    pub reason: i32,
}

impl From<DeathEntry> for ChildExit {
    fn from(entry: DeathEntry) -> Self {
        Self {
            thread: entry.thread,
            status: entry.status,
            reason: entry.packed_reason(),
        }
    }
}

impl TeamManager {
    /// Collects a dead child of the calling team matching `target`.
    pub fn wait_for_child(&self, target: WaitTarget, flags: WaitFlags) -> TeamResult<ChildExit> {
        if target == WaitTarget::AnyInOwnGroup {
            warn!("[wait] waiting for the caller's own group is not supported");
            return Err(TeamError::NotImplemented);
        }
        let caller = self.current_team()?;
        let mut interest = self.teams.lock().register_interest(caller, target)?;
        let result = self.reap(caller, target, flags, &mut interest);
        if result.is_err() {
            self.teams.lock().withdraw_interest(&mut interest);
        }
        if let Ok(child) = &result {
            debug!("[wait] team {} reaped thread {} ({})", caller, child.thread, child.status);
        }
        result
    }

    fn reap(&self, caller: Pid, target: WaitTarget, flags: WaitFlags, interest: &mut Interest) -> TeamResult<ChildExit> {
        loop {
            let (event, slot, seen) = {
                let mut teams = self.teams.lock();
                if let Some(entry) = teams.poll_death_entry(caller, target, interest)? {
                    return Ok(entry.into());
                }
                if flags.contains(WaitFlags::NO_HANG) {
                    return Err(TeamError::WouldBlock);
                }
                let (event, slot) = teams.begin_wait(caller, interest)?;
                let seen = event.seq();
                (event, slot, seen)
            };
            let woken = event.wait(seen, true);
            self.teams.lock().end_wait(slot);
            if !woken {
                return Err(TeamError::Interrupted);
            }
        }
    }

    /// Wildcard waiters currently counted on `team`'s ledger.
    pub fn wait_for_any_of(&self, team: Pid) -> Option<i32> {
        self.teams.lock().get(team).map(|team| team.ledger().wait_for_any())
    }

    /// Group-wide waiters currently registered on `group`.
    pub fn group_wait_for_any(&self, group: Pid) -> Option<i32> {
        self.teams.lock().group(group).map(|group| group.wait_for_any())
    }

    /// Death entries not yet collected from `team`'s ledger.
    pub fn pending_death_entries(&self, team: Pid) -> Option<usize> {
        self.teams.lock().get(team).map(|team| team.ledger().len())
    }
}
