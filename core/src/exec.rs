use crate::manager::TeamManager;
use crate::mm::{ArgSource, TeamArgs};
use alloc::string::String;
use alloc::sync::Arc;
use core::convert::Infallible;
use team_process::{TeamError, TeamResult};

impl TeamManager {
    /// Replaces the program of the calling team. Only the main thread may
    /// do this, and only while it is the team's sole thread (a debugger
    /// nub thread does not count).
    ///
    /// Errors are reported only up to the point of no return; after that a
    /// failure to start the new program ends the team.
    pub fn exec(self: &Arc<Self>, path: &str, source: ArgSource<'_>) -> TeamResult<Infallible> {
        let tid = self.current_thread();
        let team = self.current_team()?;
        if team == self.kernel_team() {
            return Err(TeamError::NotAllowed);
        }
        {
            let teams = self.teams.lock();
            let node = teams.lookup(team).ok_or(TeamError::NoSuchProcess)?;
            if node.get_main_thread() != Some(tid) {
                return Err(TeamError::NotAllowed);
            }
            let nub = node.debug.installed().then_some(node.debug.nub_thread).flatten();
            if node.threads().any(|other| other != tid && Some(other) != nub) {
                return Err(TeamError::NotAllowed);
            }
        }
        let mut team_args = TeamArgs::copy_in(&source, &*self.platform.user, &self.config)?;
        team_args.args[0] = String::from(path);

        // point of no return
        info!("[team] team {} exec {}", team, path);
        self.platform.debugger.prepare_for_exec(team);
        let space = {
            let mut teams = self.teams.lock();
            let node = teams.get_mut(team).ok_or(TeamError::NoSuchProcess)?;
            node.set_name(path);
            node.set_args(&team_args.summary(), team_args.args.len());
            if let Some(io_context) = node.resources.io_context.as_mut() {
                io_context.exec();
            }
            node.resources.address_space.clone()
        };
        if let Some(space) = space {
            space.delete_areas();
        }
        self.platform.ipc.delete_owned_ports(team);
        self.platform.ipc.delete_owned_sems(team);
        self.platform.loader.remove_images(team);
        if let Some(thread) = self.threads.lock().get_mut(tid) {
            thread.name = String::from(path.rsplit('/').next().unwrap_or(path));
            thread.user_stack_area = None;
        }
        self.platform.debugger.finish_after_exec(team);

        let status = self.run_team(team, tid, team_args).unwrap_or_else(|err| {
            warn!("[team] team {} failed to exec {}: {}", team, path, err);
            err.code()
        });
        self.exit_current_thread(status)
    }
}
