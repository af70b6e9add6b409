use crate::manager::{NewTeam, TeamManager};
use crate::mm::{ArgSource, StackLayout, TeamArgs, write_program_args};
use crate::platform::Protection;
use crate::process::LoadingInfo;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use bitflags::bitflags;
use spin::Mutex;
use team_process::{Pid, TeamError, TeamResult, TeamState, ThreadRecord, Tid};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LoadFlags: u32 {
        /// Do not return before the first image is loaded, and report
        /// loading failures to the caller.
        const WAIT_TILL_LOADED = 0x01;
    }
}

/// Arguments handed from the spawner to the new main thread. Kept in a
/// shared slot so a failed spawn releases them after the address space and
/// descriptor table, not with the thread body.
type ArgsSlot = Arc<Mutex<Option<TeamArgs>>>;

impl TeamManager {
    /// Creates a new team running the program named by the first argument,
    /// as a child of the calling team. Returns the new team's ID, which is
    /// also the ID of its main thread.
    pub fn load_image(self: &Arc<Self>, source: ArgSource<'_>, priority: i32, flags: LoadFlags) -> TeamResult<Tid> {
        let parent = self.current_team()?;
        if source.arg_count() < 1 {
            return Err(TeamError::BadValue);
        }

        let id = self.ids.allocate();
        let mut team = self.new_team_node(id, "");
        let loading = flags
            .contains(LoadFlags::WAIT_TILL_LOADED)
            .then(|| Arc::new(LoadingInfo::new(self.new_event())));
        team.resources.loading = loading.clone();

        let new_team = NewTeam::link(self, team, parent)?;
        let team_args = TeamArgs::copy_in(&source, &*self.platform.user, &self.config)?;
        let name = String::from(team_args.path());
        new_team.describe(&name, &team_args.summary(), team_args.args.len());
        let args: ArgsSlot = Arc::new(Mutex::new(Some(team_args)));

        let io_context = self.inherit_io_context(parent)?;
        let space = self.platform.vm.create_address_space(id)?;
        new_team.install(io_context, space);
        new_team.add_main_thread(ThreadRecord::new(id, id, &name, priority));

        let manager = self.clone();
        let handoff = args.clone();
        let entry = Box::new(move || manager.team_main(id, handoff));
        if let Err(err) = self.platform.scheduler.spawn(id, &name, priority, entry) {
            let (space, io_context) = new_team.uninstall();
            drop(space);
            drop(io_context);
            drop(args);
            return Err(err);
        }
        let id = new_team.commit();
        info!("[team] team {} ({}) created by {}", id, name, parent);

        self.platform.debugger.team_created(id);
        if let Some(loading) = loading {
            loading.wait()?;
        }
        Ok(id)
    }

    /// Body of a new team's main thread.
    fn team_main(self: &Arc<Self>, team: Pid, args: ArgsSlot) {
        let team_args = args.lock().take();
        let status = match team_args {
            Some(team_args) => self.run_team(team, team, team_args),
            None => Err(TeamError::Aborted),
        };
        let status = status.unwrap_or_else(|err| {
            warn!("[team] team {} failed to start: {}", team, err);
            self.record_load_failure(team, err);
            err.code()
        });
        self.thread_exit(team, status);
    }

    /// Builds the main stack, loads the runtime loader and enters user space.
    /// Shared by new teams and exec.
    pub(crate) fn run_team(&self, team: Pid, tid: Tid, team_args: TeamArgs) -> TeamResult<i32> {
        let (space, name) = {
            let teams = self.teams.lock();
            let node = teams.get(team).ok_or(TeamError::NoSuchProcess)?;
            let space = node.resources.address_space.clone().ok_or(TeamError::NoSuchProcess)?;
            (space, String::from(node.get_name()))
        };

        let layout = StackLayout::new(&self.config, &team_args)?;
        let area = space.create_area(
            &format!("{}_main_stack", name),
            layout.base,
            layout.size,
            Protection::READ | Protection::WRITE | Protection::STACK,
        )?;
        if let Some(thread) = self.threads.lock().get_mut(tid) {
            thread.user_stack_area = Some(area);
            thread.user_stack_base = layout.base;
            thread.user_stack_size = layout.size;
        }

        let program = write_program_args(&*space, &layout, team_args, &self.config)?;
        let entry = self
            .platform
            .loader
            .load_program(&self.config.runtime_loader_path, &program, team, &*space)?;
        drop(space);

        let loading = {
            let mut teams = self.teams.lock();
            let node = teams.get_mut(team).ok_or(TeamError::NoSuchProcess)?;
            node.advance_state(TeamState::Normal);
            node.resources.loading.take()
        };
        if let Some(loading) = loading {
            loading.complete(Ok(()));
        }
        debug!("[team] team {} entering user space at {:#x}", team, entry);
        self.platform.arch.enter_userspace(team, entry, &program)
    }

    fn record_load_failure(&self, team: Pid, err: TeamError) {
        if let Some(loading) = self.teams.lock().get(team).and_then(|t| t.resources.loading.as_ref()) {
            loading.record_failure(err);
        }
    }
}
