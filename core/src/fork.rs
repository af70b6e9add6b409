use crate::manager::{NewTeam, TeamManager};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use team_process::{TeamError, TeamResult, TeamState, ThreadRecord, Tid};

impl TeamManager {
    /// Duplicates the calling team: address space (copy-on-write), descriptor
    /// table, name and arguments. The child's only thread resumes from the
    /// caller's saved user state. Returns the child's ID to the parent.
    pub fn fork(self: &Arc<Self>) -> TeamResult<Tid> {
        let tid = self.current_thread();
        let parent = self.current_team()?;
        if parent == self.kernel_team() {
            return Err(TeamError::NotAllowed);
        }

        let (name, args, argc, parent_space) = {
            let teams = self.teams.lock();
            let team = teams.lookup(parent).ok_or(TeamError::NoSuchProcess)?;
            let space = team.resources.address_space.clone().ok_or(TeamError::NoSuchProcess)?;
            (String::from(team.get_name()), String::from(team.get_args()), team.get_argc(), space)
        };
        let (thread_name, priority, stack_area) = {
            let threads = self.threads.lock();
            let thread = threads.get(tid).ok_or(TeamError::NoSuchProcess)?;
            (thread.name.clone(), thread.priority, thread.user_stack_area)
        };

        let id = self.ids.allocate();
        let mut team = self.new_team_node(id, &name);
        team.set_args(&args, argc);
        team.advance_state(TeamState::Normal);
        let new_team = NewTeam::link(self, team, parent)?;

        let io_context = self.inherit_io_context(parent)?;
        let space = self.platform.vm.create_address_space(id)?;
        let mut record = ThreadRecord::new(id, id, &thread_name, priority);
        for area in parent_space.areas() {
            let copy = space.copy_area(&*parent_space, &area)?;
            if Some(area.id) == stack_area {
                record.user_stack_area = Some(copy);
                record.user_stack_base = area.base;
                record.user_stack_size = area.size;
            }
        }
        drop(parent_space);
        let frame = self.platform.arch.store_fork_frame();

        new_team.install(io_context, space);
        new_team.add_main_thread(record);

        let manager = self.clone();
        let entry = Box::new(move || {
            let status = manager.platform.arch.restore_fork_frame(frame);
            manager.thread_exit(id, status);
        });
        if let Err(err) = self.platform.scheduler.spawn(id, &thread_name, priority, entry) {
            let (space, io_context) = new_team.uninstall();
            drop(space);
            drop(io_context);
            return Err(err);
        }
        let id = new_team.commit();
        info!("[team] team {} forked from {}", id, parent);
        self.platform.debugger.team_created(id);
        Ok(id)
    }
}
