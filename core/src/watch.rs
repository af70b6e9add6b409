use crate::manager::TeamManager;
use alloc::boxed::Box;
use core::sync::atomic::Ordering;
use team_process::{Pid, TeamError, TeamResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WatcherId(pub u64);

/// Called once with the team ID while the team is being destroyed.
pub type WatchHook = Box<dyn FnOnce(Pid) + Send>;

pub struct Watcher {
    id: WatcherId,
    hook: WatchHook,
}

impl Watcher {
    pub(crate) fn notify(self, team: Pid) {
        trace!("[watch] watcher {:?} notified of team {}", self.id, team);
        (self.hook)(team)
    }
}

impl TeamManager {
    /// Registers `hook` to run when team `id` is deleted. Hooks run in
    /// registration order.
    pub fn start_watching_team(&self, id: Pid, hook: WatchHook) -> TeamResult<WatcherId> {
        if id <= 0 {
            return Err(TeamError::BadValue);
        }
        let watcher = WatcherId(self.next_watcher.fetch_add(1, Ordering::Relaxed));
        let mut teams = self.teams.lock();
        let team = teams.lookup_mut(id).ok_or(TeamError::NoSuchProcess)?;
        team.resources.watchers.push(Watcher { id: watcher, hook });
        Ok(watcher)
    }

    pub fn stop_watching_team(&self, id: Pid, watcher: WatcherId) -> TeamResult<()> {
        if id <= 0 {
            return Err(TeamError::BadValue);
        }
        let removed = {
            let mut teams = self.teams.lock();
            let team = teams.lookup_mut(id).ok_or(TeamError::NoSuchProcess)?;
            let watchers = &mut team.resources.watchers;
            let index = watchers.iter().position(|w| w.id == watcher).ok_or(TeamError::NotFound)?;
            watchers.remove(index)
        };
        drop(removed);
        Ok(())
    }
}
