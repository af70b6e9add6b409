use crate::manager::TeamManager;
use team_process::{Pid, TeamError, TeamResult};

impl TeamManager {
    /// Moves team `pid` (0: the caller) into group `pgid` (0: a group named
    /// after `pid`), creating that group when it does not exist yet. The
    /// target must be the caller or one of its children, must not lead a
    /// group and must stay in its session.
    pub fn setpgid(&self, pid: Pid, pgid: Pid) -> TeamResult<Pid> {
        if pid < 0 || pgid < 0 {
            return Err(TeamError::BadValue);
        }
        let caller = self.current_team()?;
        let pid = if pid == 0 { caller } else { pid };
        let pgid = if pgid == 0 { pid } else { pgid };
        // allocated up front, the team lock is not held across allocation
        let event = self.new_event();

        let mut teams = self.teams.lock();
        let target = teams.lookup(pid).ok_or(TeamError::NoSuchProcess)?;
        if target.is_group_leader() {
            // a leader may only "move" into its own group
            return if pid == caller && pgid == pid {
                Ok(pid)
            } else {
                Err(TeamError::NotAllowed)
            };
        }
        if pid != caller {
            let caller_session = teams.lookup(caller).map(|team| team.get_session_id());
            if target.get_parent() != Some(caller) || caller_session != Some(target.get_session_id()) {
                return Err(TeamError::NotAllowed);
            }
        }
        if target.is_session_leader() {
            return Err(TeamError::NotAllowed);
        }
        if target.get_group_id() == pgid {
            return Ok(pgid);
        }
        let session = target.get_session_id();
        if teams.group(pgid).is_some() {
            if teams.group_in_session(session, pgid).is_none() {
                return Err(TeamError::NotAllowed);
            }
        } else if pgid != pid {
            return Err(TeamError::NotAllowed);
        }

        let freed = teams.remove_from_group(pid);
        if teams.group(pgid).is_none() {
            teams.create_group(pgid, session, event);
        }
        teams.insert_into_group(pid, pgid);
        drop(teams);
        drop(freed);
        info!("[team] team {} moved to group {}", pid, pgid);
        Ok(pgid)
    }

    /// Makes the caller the leader of a new session and of a new group in
    /// it. Group leaders cannot do this.
    pub fn setsid(&self) -> TeamResult<Pid> {
        let caller = self.current_team()?;
        let event = self.new_event();

        let mut teams = self.teams.lock();
        let team = teams.lookup(caller).ok_or(TeamError::NoSuchProcess)?;
        if team.is_group_leader() || teams.session(caller).is_some() || teams.group(caller).is_some() {
            return Err(TeamError::NotAllowed);
        }
        let freed = teams.remove_from_group(caller);
        teams.create_session(caller);
        teams.create_group(caller, caller, event);
        teams.insert_into_group(caller, caller);
        drop(teams);
        drop(freed);
        info!("[team] team {} started session {}", caller, caller);
        Ok(caller)
    }
}
