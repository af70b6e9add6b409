use crate::manager::TeamManager;
use crate::process::DeathCounter;
use alloc::sync::Arc;
use alloc::vec::Vec;
use team_process::{DeathEntry, Pid, PortId, Signal, TeamError, TeamResult, ThreadExit, Tid};

impl TeamManager {
    /// Ends the calling thread with `status`.
    pub fn exit_current_thread(self: &Arc<Self>, status: i32) -> ! {
        let tid = self.current_thread();
        self.thread_exit(tid, status);
        self.platform.scheduler.terminate_current()
    }

    /// Ends the calling team with `status`, whichever of its threads calls it.
    pub fn exit_team(self: &Arc<Self>, status: i32) -> ! {
        let tid = self.current_thread();
        let main = {
            let teams = self.teams.lock();
            let team = self.threads.lock().team_of(tid);
            team.and_then(|team| teams.get(team)).and_then(|team| team.get_main_thread())
        };
        if let Some(main) = main {
            self.threads.lock().set_exit_once(main, ThreadExit::normal(status));
            if main != tid {
                self.platform.scheduler.send_signal(main, Signal::Kill);
            }
        }
        self.exit_current_thread(status)
    }

    /// Sends a kill to the main thread of `id`; the rest of the team follows
    /// once it is gone.
    pub fn kill_team(&self, id: Pid) -> TeamResult<()> {
        if id == self.kernel_team() {
            return Err(TeamError::NotAllowed);
        }
        let main = {
            let mut teams = self.teams.lock();
            let team = teams.lookup_mut(id).ok_or(TeamError::NoSuchProcess)?;
            team.pending_signals |= 1 << Signal::Kill as u64;
            team.get_main_thread().ok_or(TeamError::NoSuchProcess)?
        };
        self.threads.lock().set_exit_once(main, ThreadExit::killed(Signal::Kill));
        info!("[team] killing team {}", id);
        self.platform.scheduler.send_signal(main, Signal::Kill);
        Ok(())
    }

    pub fn kill_thread(&self, tid: Tid) -> TeamResult<()> {
        if !self.threads.lock().get(tid).is_some_and(|thread| thread.team != self.kernel_team()) {
            return Err(TeamError::NoSuchProcess);
        }
        self.threads.lock().set_exit_once(tid, ThreadExit::killed(Signal::KillThread));
        self.platform.scheduler.send_signal(tid, Signal::KillThread);
        Ok(())
    }

    /// Bookkeeping for a thread that stopped running. When it is the main
    /// thread of a user team the whole team goes down with it: its death
    /// entry is posted, it leaves the tree, and its resources are released
    /// before waiters are woken.
    pub(crate) fn thread_exit(self: &Arc<Self>, tid: Tid, status: i32) {
        let mut teams = self.teams.lock();
        let mut threads = self.threads.lock();
        let Some(thread) = threads.remove(tid) else {
            warn!("[thread] exit of unknown thread {}", tid);
            return;
        };
        drop(threads);
        let exit = thread.exit.unwrap_or(ThreadExit::normal(status));
        let team_id = thread.team;
        let Some(team) = teams.get_mut(team_id) else {
            panic!("[thread] thread {} belongs to missing team {}", tid, team_id);
        };
        team.dead_threads_kernel_time += thread.kernel_time;
        team.dead_threads_user_time += thread.user_time;
        let was_main = team.remove_thread(tid);

        if !was_main || team_id == self.kernel_team() {
            let death = team.resources.death.clone();
            drop(teams);
            if let Some(death) = death {
                death.thread_gone();
            }
            debug!("[thread] thread {} of team {} exited: {:?}", tid, team_id, exit);
            return;
        }

        let debugger_port = team.debug.debugger_port;
        let parent = team.get_parent();
        let entry = DeathEntry::new(team_id, tid, team.get_group_id(), exit);
        let events = teams.death_events(team_id);
        let parent_main = parent.and_then(|parent| teams.get(parent)).and_then(|p| p.get_main_thread());
        if let Some(parent) = parent {
            teams.post_death_entry(parent, entry, self.config.max_dead_children);
        }
        let freed = teams.remove_team(team_id);
        drop(teams);
        drop(freed);
        info!(
            "[team] team {} died: status {} reason {:?} signal {}",
            team_id, entry.status, entry.reason, entry.signal
        );

        self.delete_team(team_id, debugger_port);
        for event in events {
            event.signal();
        }
        if let Some(parent_main) = parent_main {
            self.platform.scheduler.send_signal(parent_main, Signal::Child);
        }
    }

    /// Destructor of a team already removed from the tree.
    fn delete_team(&self, id: Pid, debugger_port: Option<PortId>) {
        let (others, death) = {
            let mut teams = self.teams.lock();
            let Some(team) = teams.get_mut(id) else {
                return;
            };
            let others: Vec<Tid> = team.threads().collect();
            let death = (!others.is_empty()).then(|| Arc::new(DeathCounter::new(others.len(), self.new_event())));
            team.resources.death = death.clone();
            (others, death)
        };
        for &tid in others.iter() {
            self.threads.lock().set_exit_once(tid, ThreadExit::killed(Signal::KillThread));
            self.platform.scheduler.send_signal(tid, Signal::KillThread);
        }
        if let Some(death) = death {
            debug!("[team] team {} waiting for {} threads", id, death.remaining());
            death.wait_all();
        }

        let (loading, watchers, space, io_context) = {
            let mut teams = self.teams.lock();
            let Some(team) = teams.get_mut(id) else {
                return;
            };
            let resources = &mut team.resources;
            (
                resources.loading.take(),
                core::mem::take(&mut resources.watchers),
                resources.address_space.take(),
                resources.io_context.take(),
            )
        };
        if let Some(loading) = loading {
            loading.complete(Err(loading.failure().unwrap_or(TeamError::Aborted)));
        }
        for watcher in watchers {
            watcher.notify(id);
        }

        drop(space);
        self.platform.ipc.delete_owned_ports(id);
        self.platform.ipc.delete_owned_sems(id);
        self.platform.loader.remove_images(id);
        drop(io_context);

        let team = self.teams.lock().delete(id);
        drop(team);
        self.platform.debugger.team_deleted(id, debugger_port);
        debug!("[team] team {} deleted", id);
    }
}
