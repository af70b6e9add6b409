use crate::manager::TeamManager;
use crate::platform::AddressSpace;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write;
use num_enum::TryFromPrimitive;
use team_process::{DebugFlags, Pid, PortId, TeamError, TeamResult, TeamState, Tid};

/// Team selector meaning "the calling team".
pub const CURRENT_TEAM: Pid = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInfo {
    pub team: Pid,
    pub thread_count: usize,
    pub image_count: usize,
    pub area_count: usize,
    pub debugger_nub_thread: Option<Tid>,
    pub debugger_nub_port: Option<PortId>,
    pub argc: usize,
    pub args: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamUsage {
    pub kernel_time: u64,
    pub user_time: u64,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum UsageWho {
    /// The team's own threads, dead ones included.
    SelfTeam = 0,
    /// Reaped and still running children.
    Children = -1,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum ProcessInfoKind {
    Session = 1,
    Group = 2,
    Parent = 3,
}

impl TeamManager {
    fn resolve(&self, id: Pid) -> TeamResult<Pid> {
        if id == CURRENT_TEAM { self.current_team() } else { Ok(id) }
    }

    pub fn team_info(&self, id: Pid) -> TeamResult<TeamInfo> {
        let id = self.resolve(id)?;
        let (mut info, space) = {
            let teams = self.teams.lock();
            let team = teams.lookup(id).ok_or(TeamError::NoSuchProcess)?;
            let args = String::from(team.get_args());
            let info = TeamInfo {
                team: id,
                thread_count: team.thread_count(),
                image_count: 0,
                area_count: 0,
                debugger_nub_thread: team.debug.nub_thread,
                debugger_nub_port: team.debug.nub_port,
                argc: team.get_argc(),
                args,
            };
            (info, team.resources.address_space.clone())
        };
        info.image_count = self.platform.loader.image_count(id);
        info.area_count = space.map_or(0, |space| space.areas().len());
        Ok(info)
    }

    /// Iterates live teams in ID order. `cookie` starts at 0.
    pub fn next_team_info(&self, cookie: &mut Pid) -> TeamResult<TeamInfo> {
        loop {
            let next = {
                let teams = self.teams.lock();
                teams.iter_from((*cookie).max(1)).next().map(|team| team.get_pid())
            };
            let id = next.ok_or(TeamError::NoSuchProcess)?;
            *cookie = id + 1;
            // the team may die between the two lookups
            match self.team_info(id) {
                Err(TeamError::NoSuchProcess) => continue,
                result => return result,
            }
        }
    }

    pub fn team_usage_info(&self, id: Pid, who: UsageWho) -> TeamResult<TeamUsage> {
        let id = self.resolve(id)?;
        let teams = self.teams.lock();
        let threads = self.threads.lock();
        let team = teams.lookup(id).ok_or(TeamError::NoSuchProcess)?;
        let own = |team: &team_process::TeamNode<_>| {
            team.threads()
                .filter_map(|tid| threads.get(tid))
                .fold(
                    TeamUsage {
                        kernel_time: team.dead_threads_kernel_time,
                        user_time: team.dead_threads_user_time,
                    },
                    |usage, thread| TeamUsage {
                        kernel_time: usage.kernel_time + thread.kernel_time,
                        user_time: usage.user_time + thread.user_time,
                    },
                )
        };
        let usage = match who {
            UsageWho::SelfTeam => own(team),
            UsageWho::Children => team
                .children()
                .filter_map(|child| teams.lookup(child))
                .map(own)
                .fold(
                    TeamUsage {
                        kernel_time: team.ledger().kernel_time,
                        user_time: team.ledger().user_time,
                    },
                    |total, child| TeamUsage {
                        kernel_time: total.kernel_time + child.kernel_time,
                        user_time: total.user_time + child.user_time,
                    },
                ),
        };
        Ok(usage)
    }

    pub fn getpid(&self) -> TeamResult<Pid> {
        self.current_team()
    }

    /// Parent of the calling team; 0 for the kernel team.
    pub fn getppid(&self) -> TeamResult<Pid> {
        let caller = self.current_team()?;
        let teams = self.teams.lock();
        let team = teams.lookup(caller).ok_or(TeamError::NoSuchProcess)?;
        Ok(team.get_parent().unwrap_or(0))
    }

    /// Group of the team owning thread `tid` (0: the caller).
    pub fn getpgid(&self, tid: Tid) -> TeamResult<Pid> {
        self.process_info(tid, ProcessInfoKind::Group)
    }

    pub fn getsid(&self, tid: Tid) -> TeamResult<Pid> {
        self.process_info(tid, ProcessInfoKind::Session)
    }

    /// Session, group or parent of the team owning thread `tid` (0: the
    /// caller). Only the caller may ask for its own parent.
    pub fn process_info(&self, tid: Tid, which: ProcessInfoKind) -> TeamResult<Pid> {
        let current = self.current_thread();
        if which == ProcessInfoKind::Parent && tid != 0 && tid != current {
            let caller = self.current_team()?;
            if self.threads.lock().team_of(tid) != Some(caller) {
                return Err(TeamError::BadValue);
            }
        }
        let tid = if tid == 0 { current } else { tid };
        let teams = self.teams.lock();
        let team_id = self.threads.lock().team_of(tid).ok_or(TeamError::NoSuchProcess)?;
        let team = teams.lookup(team_id).ok_or(TeamError::NoSuchProcess)?;
        Ok(match which {
            ProcessInfoKind::Session => team.get_session_id(),
            ProcessInfoKind::Group => team.get_group_id(),
            ProcessInfoKind::Parent => team.get_parent().unwrap_or(0),
        })
    }

    /// Parent of any live team, for kernel-side inspection.
    pub fn parent_of(&self, id: Pid) -> TeamResult<Pid> {
        let teams = self.teams.lock();
        Ok(teams.lookup(id).ok_or(TeamError::NoSuchProcess)?.get_parent().unwrap_or(0))
    }

    pub fn team_state(&self, id: Pid) -> Option<TeamState> {
        self.teams.lock().get(id).map(|team| team.get_state())
    }

    pub fn team_name(&self, id: Pid) -> TeamResult<String> {
        let teams = self.teams.lock();
        Ok(String::from(teams.lookup(id).ok_or(TeamError::NoSuchProcess)?.get_name()))
    }

    pub fn children_of(&self, id: Pid) -> TeamResult<Vec<Pid>> {
        let teams = self.teams.lock();
        Ok(teams.lookup(id).ok_or(TeamError::NoSuchProcess)?.children().collect())
    }

    pub fn group_members(&self, pgid: Pid) -> Option<Vec<Pid>> {
        self.teams.lock().group(pgid).map(|group| group.members().collect())
    }

    pub fn team_address_space(&self, id: Pid) -> TeamResult<Arc<dyn AddressSpace>> {
        let id = self.resolve(id)?;
        let teams = self.teams.lock();
        let team = teams.lookup(id).ok_or(TeamError::NoSuchProcess)?;
        team.resources.address_space.clone().ok_or(TeamError::BadValue)
    }

    /// Open descriptors of team `id`.
    pub fn descriptor_count(&self, id: Pid) -> TeamResult<usize> {
        let id = self.resolve(id)?;
        let teams = self.teams.lock();
        let team = teams.lookup(id).ok_or(TeamError::NoSuchProcess)?;
        Ok(team.resources.io_context.as_ref().map_or(0, |io| io.descriptor_count()))
    }

    /// Marks `id` as debugged. `nub_thread` must be one of its threads.
    pub fn install_debugger(
        &self,
        id: Pid,
        nub_thread: Tid,
        nub_port: PortId,
        debugger_port: PortId,
    ) -> TeamResult<()> {
        let mut teams = self.teams.lock();
        let team = teams.lookup_mut(id).ok_or(TeamError::NoSuchProcess)?;
        if !team.threads().any(|tid| tid == nub_thread) {
            return Err(TeamError::BadValue);
        }
        team.debug.flags |= DebugFlags::DEBUGGER_INSTALLED;
        team.debug.nub_thread = Some(nub_thread);
        team.debug.nub_port = Some(nub_port);
        team.debug.debugger_port = Some(debugger_port);
        Ok(())
    }

    /// One line per live team, for the kernel debugger.
    pub fn dump_teams(&self) -> String {
        let teams = self.teams.lock();
        let mut out = String::new();
        let _ = writeln!(out, "{:>6} {:>6} {:>6} {:>6} {:>7} {:<8} name", "id", "parent", "group", "session", "threads", "state");
        for team in teams.iter() {
            let _ = writeln!(
                out,
                "{:>6} {:>6} {:>6} {:>6} {:>7} {:<8} {}",
                team.get_pid(),
                team.get_parent().unwrap_or(0),
                team.get_group_id(),
                team.get_session_id(),
                team.thread_count(),
                alloc::format!("{:?}", team.get_state()),
                team.get_name()
            );
        }
        out
    }
}
