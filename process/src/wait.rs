//! Reaper bookkeeping: who is interested in which dead children, and how a
//! waiter finds and consumes a [`DeathEntry`].

use crate::death::{DeathEntry, EntryFilter};
use crate::error::{TeamError, TeamResult};
use crate::event::WaitEvent;
use crate::table::TeamTable;
use crate::Pid;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// What `wait_for_child` was asked to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// One specific child team.
    Child(Pid),
    /// Any child of the caller.
    AnyChild,
    /// Any team in the caller's own process group.
    AnyInOwnGroup,
    /// Any team in the given process group.
    Group(Pid),
}

impl WaitTarget {
    /// Decodes the classic selector: `> 0` a child, `-1` any child, `0` the
    /// caller's own group, `< -1` the group `-child`.
    pub fn from_raw(child: Pid) -> Self {
        match child {
            c if c > 0 => WaitTarget::Child(c),
            -1 => WaitTarget::AnyChild,
            0 => WaitTarget::AnyInOwnGroup,
            c => WaitTarget::Group(c.saturating_neg()),
        }
    }
}

/// A wildcard interest registered by a waiter. It has to be withdrawn
/// exactly once, whichever way the wait ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    None,
    /// Counted on the ledger of this team.
    AnyChild(Pid),
    /// Counted on the group and on the ledger of every member.
    Group { pgid: Pid, serial: u64 },
}

/// The counter a blocked waiter bumped, so it can be dropped after waking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSlot {
    Ledger(Pid),
    Group { pgid: Pid, serial: u64 },
}

impl<T> TeamTable<T> {
    pub fn register_interest(&mut self, caller: Pid, target: WaitTarget) -> TeamResult<Interest> {
        let Some(node) = self.lookup_mut(caller) else {
            return Err(TeamError::NoSuchProcess);
        };
        match target {
            WaitTarget::Child(_) => Ok(Interest::None),
            WaitTarget::AnyChild => {
                node.ledger.adjust_wait_for_any(1);
                Ok(Interest::AnyChild(caller))
            }
            WaitTarget::Group(pgid) => {
                let sid = node.session_id;
                let Some(group) = self.groups.get_mut(&pgid).filter(|g| g.get_sid() == sid) else {
                    return Err(TeamError::NoSuchChild);
                };
                group.wait_for_any += 1;
                for member in group.members.iter() {
                    if let Some(team) = self.teams.get_mut(member) {
                        team.ledger.adjust_wait_for_any(1);
                    }
                }
                Ok(Interest::Group {
                    pgid,
                    serial: group.get_serial(),
                })
            }
            WaitTarget::AnyInOwnGroup => Err(TeamError::NotImplemented),
        }
    }

    /// Reverses [`TeamTable::register_interest`] and resets `interest`, so
    /// calling it twice is harmless.
    pub fn withdraw_interest(&mut self, interest: &mut Interest) {
        match core::mem::replace(interest, Interest::None) {
            Interest::None => {}
            Interest::AnyChild(team) => {
                if let Some(team) = self.teams.get_mut(&team) {
                    team.ledger.adjust_wait_for_any(-1);
                }
            }
            Interest::Group { pgid, serial } => {
                let Some(group) = self.groups.get_mut(&pgid) else {
                    return;
                };
                if group.get_serial() != serial {
                    return;
                }
                group.wait_for_any -= 1;
                for member in group.members.iter() {
                    if let Some(team) = self.teams.get_mut(member) {
                        team.ledger.adjust_wait_for_any(-1);
                    }
                }
            }
        }
    }

    /// Looks for a death entry matching `target`.
    ///
    /// `Ok(Some(_))` hands out an entry; the caller's interest has been
    /// withdrawn by then. `Ok(None)` means nothing is ready yet but
    /// something may still die. [`TeamError::NoSuchChild`] means nothing
    /// ever will.
    pub fn poll_death_entry(
        &mut self,
        caller: Pid,
        target: WaitTarget,
        interest: &mut Interest,
    ) -> TeamResult<Option<DeathEntry>> {
        let Some(node) = self.lookup(caller) else {
            return Err(TeamError::NoSuchProcess);
        };
        match target {
            WaitTarget::Child(child) => {
                if let Some(index) = node.ledger.position(EntryFilter::Team(child)) {
                    return Ok(Some(self.consume(caller, index, interest)));
                }
                match self.lookup(child) {
                    Some(team) if team.parent == Some(caller) => Ok(None),
                    _ => Err(TeamError::NoSuchChild),
                }
            }
            WaitTarget::AnyChild => {
                if let Some(index) = node.ledger.position(EntryFilter::Any) {
                    return Ok(Some(self.consume(caller, index, interest)));
                }
                if node.has_children() {
                    Ok(None)
                } else {
                    Err(TeamError::NoSuchChild)
                }
            }
            WaitTarget::Group(pgid) => {
                let members: Vec<Pid> = self
                    .groups
                    .get(&pgid)
                    .map(|group| group.members.iter().copied().collect())
                    .unwrap_or_default();
                let mut holders = members
                    .iter()
                    .map(|&member| (member, EntryFilter::Any))
                    .chain(core::iter::once((caller, EntryFilter::Group(pgid))));
                let found = holders.find_map(|(holder, filter)| {
                    self.teams
                        .get(&holder)
                        .and_then(|team| team.ledger.position(filter))
                        .map(|index| (holder, index))
                });
                if let Some((holder, index)) = found {
                    return Ok(Some(self.consume(holder, index, interest)));
                }

                let own_child_in_group = node
                    .children()
                    .filter_map(|child| self.lookup(child))
                    .any(|child| child.group_id == pgid);
                let member_has_children = members
                    .iter()
                    .filter_map(|&member| self.lookup(member))
                    .any(|member| member.has_children());
                if own_child_in_group || member_has_children {
                    Ok(None)
                } else {
                    Err(TeamError::NoSuchChild)
                }
            }
            WaitTarget::AnyInOwnGroup => Err(TeamError::NotImplemented),
        }
    }

    /// Copies out the entry at `index` of `holder`'s ledger, withdraws the
    /// waiter's interest and drops the entry if no wildcard waiter is left
    /// that could still want it.
    fn consume(&mut self, holder: Pid, index: usize, interest: &mut Interest) -> DeathEntry {
        let Some(entry) = self.teams.get(&holder).and_then(|team| team.ledger.get(index)) else {
            panic!("[wait] death entry {} of team {} vanished", index, holder);
        };
        self.withdraw_interest(interest);
        if let Some(team) = self.teams.get_mut(&holder) {
            if team.ledger.wait_for_any == 0 {
                team.ledger.remove(index);
            }
        }
        entry
    }

    /// Picks the event a blocked waiter sleeps on and counts it as a waiter.
    pub fn begin_wait(&mut self, caller: Pid, interest: &Interest) -> TeamResult<(Arc<WaitEvent>, WaitSlot)> {
        if let Interest::Group { pgid, serial } = *interest {
            if let Some(group) = self.groups.get_mut(&pgid).filter(|g| g.get_serial() == serial) {
                group.waiters += 1;
                return Ok((group.event.clone(), WaitSlot::Group { pgid, serial }));
            }
        }
        let team = self.teams.get_mut(&caller).ok_or(TeamError::NoSuchProcess)?;
        team.ledger.waiters += 1;
        Ok((team.ledger.event.clone(), WaitSlot::Ledger(caller)))
    }

    pub fn end_wait(&mut self, slot: WaitSlot) {
        match slot {
            WaitSlot::Ledger(team) => {
                if let Some(team) = self.teams.get_mut(&team) {
                    team.ledger.waiters = team.ledger.waiters.saturating_sub(1);
                }
            }
            WaitSlot::Group { pgid, serial } => {
                if let Some(group) = self.groups.get_mut(&pgid).filter(|g| g.get_serial() == serial) {
                    group.waiters = group.waiters.saturating_sub(1);
                }
            }
        }
    }
}
