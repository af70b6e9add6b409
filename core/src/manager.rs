use crate::config::TeamConfig;
use crate::platform::{AddressSpace, IoContext, Platform};
use crate::process::TeamResources;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::AtomicU64;
use spin::Mutex;
use team_process::{
    DeathLedger, IdAllocator, Pid, TeamError, TeamNode, TeamResult, TeamState, TeamTable, ThreadRecord,
    ThreadTable, Tid, WaitEvent,
};

/// Owner of every team and thread record.
///
/// Lock order: `teams` before `threads`. Neither is ever held while
/// blocking or while calling back into user-supplied code.
pub struct TeamManager {
    pub(crate) config: TeamConfig,
    pub(crate) platform: Platform,
    pub(crate) teams: Mutex<TeamTable<TeamResources>>,
    pub(crate) threads: Mutex<ThreadTable>,
    pub(crate) ids: IdAllocator,
    pub(crate) next_watcher: AtomicU64,
    kernel_team: Pid,
}

impl TeamManager {
    /// Sets up the table with the kernel team in session 1, group 1. The
    /// calling thread becomes the kernel team's main thread.
    pub fn new(config: TeamConfig, platform: Platform) -> TeamResult<Arc<Self>> {
        config.validate()?;
        let ids = IdAllocator::new(1);
        let kernel_team = ids.allocate();
        let io_context = platform.io.new_io_context()?;
        let address_space = platform.vm.kernel_address_space();

        let manager = Arc::new(Self {
            config,
            platform,
            teams: Mutex::new(TeamTable::new()),
            threads: Mutex::new(ThreadTable::new()),
            ids,
            next_watcher: AtomicU64::new(1),
            kernel_team,
        });

        let mut team = manager.new_team_node(kernel_team, &manager.config.kernel_team_name);
        team.advance_state(TeamState::Normal);
        team.set_args(&manager.config.kernel_team_name, 1);
        team.resources.io_context = Some(io_context);
        team.resources.address_space = Some(address_space);
        team.add_thread(kernel_team, true);

        let group_event = manager.new_event();
        {
            let mut teams = manager.teams.lock();
            teams.create_session(kernel_team);
            teams.create_group(kernel_team, kernel_team, group_event);
            teams.insert(team);
            teams.insert_into_group(kernel_team, kernel_team);
            manager
                .threads
                .lock()
                .insert(ThreadRecord::new(kernel_team, kernel_team, "kernel_main", 0));
        }
        info!("[team] kernel team {} initialized", kernel_team);
        Ok(manager)
    }

    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn kernel_team(&self) -> Pid {
        self.kernel_team
    }

    pub fn current_thread(&self) -> Tid {
        self.platform.scheduler.current_thread()
    }

    pub fn current_team(&self) -> TeamResult<Pid> {
        let tid = self.current_thread();
        self.threads.lock().team_of(tid).ok_or(TeamError::NoSuchProcess)
    }

    pub fn used_teams(&self) -> usize {
        self.teams.lock().used_teams()
    }

    pub fn max_teams(&self) -> usize {
        self.config.max_teams
    }

    pub fn team_is_valid(&self, id: Pid) -> bool {
        self.teams.lock().lookup(id).is_some()
    }

    pub(crate) fn new_event(&self) -> Arc<WaitEvent> {
        WaitEvent::new(self.platform.scheduler.new_wait_queue())
    }

    pub(crate) fn new_team_node(&self, id: Pid, name: &str) -> TeamNode<TeamResources> {
        TeamNode::new(id, name, DeathLedger::new(self.new_event()), TeamResources::default())
    }

    /// Duplicates the descriptor table of `parent`.
    pub(crate) fn inherit_io_context(&self, parent: Pid) -> TeamResult<Box<dyn IoContext>> {
        let teams = self.teams.lock();
        let team = teams.lookup(parent).ok_or(TeamError::NoSuchProcess)?;
        match team.resources.io_context.as_ref() {
            Some(io_context) => io_context.duplicate(),
            None => self.platform.io.new_io_context(),
        }
    }
}

/// A team that has been linked into the tree but not committed yet.
/// Dropping it unlinks and frees everything it was given.
pub(crate) struct NewTeam<'a> {
    manager: &'a TeamManager,
    id: Pid,
    armed: bool,
}

impl<'a> NewTeam<'a> {
    /// Inserts `team` below `parent`, inside `parent`'s group.
    pub(crate) fn link(manager: &'a TeamManager, team: TeamNode<TeamResources>, parent: Pid) -> TeamResult<Self> {
        let id = team.get_pid();
        let mut teams = manager.teams.lock();
        if teams.used_teams() >= manager.config.max_teams {
            warn!("[team] team limit of {} reached", manager.config.max_teams);
            return Err(TeamError::NoMemory);
        }
        let group = teams.lookup(parent).ok_or(TeamError::NoSuchProcess)?.get_group_id();
        teams.insert(team);
        teams.insert_into_parent(parent, id);
        teams.insert_into_group(id, group);
        Ok(Self {
            manager,
            id,
            armed: true,
        })
    }

    pub(crate) fn id(&self) -> Pid {
        self.id
    }

    pub(crate) fn describe(&self, name: &str, args: &str, argc: usize) {
        if let Some(team) = self.manager.teams.lock().get_mut(self.id) {
            team.set_name(name);
            team.set_args(args, argc);
        }
    }

    pub(crate) fn install(&self, io_context: Box<dyn IoContext>, space: Arc<dyn AddressSpace>) {
        if let Some(team) = self.manager.teams.lock().get_mut(self.id) {
            team.resources.io_context = Some(io_context);
            team.resources.address_space = Some(space);
        }
    }

    /// Registers the main thread, whose ID is the team ID.
    pub(crate) fn add_main_thread(&self, record: ThreadRecord) {
        let mut teams = self.manager.teams.lock();
        if let Some(team) = teams.get_mut(self.id) {
            team.add_thread(record.id, true);
        }
        self.manager.threads.lock().insert(record);
    }

    /// Takes back what [`NewTeam::install`] handed over, so it can be
    /// released in reverse order of acquisition.
    pub(crate) fn uninstall(&self) -> (Option<Arc<dyn AddressSpace>>, Option<Box<dyn IoContext>>) {
        match self.manager.teams.lock().get_mut(self.id) {
            Some(team) => (team.resources.address_space.take(), team.resources.io_context.take()),
            None => (None, None),
        }
    }

    pub(crate) fn commit(mut self) -> Pid {
        self.armed = false;
        self.id
    }
}

impl Drop for NewTeam<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (space, io_context) = self.uninstall();
        drop(space);
        drop(io_context);

        let mut teams = self.manager.teams.lock();
        if let Some(team) = teams.get(self.id) {
            let mut threads = self.manager.threads.lock();
            for tid in team.threads() {
                threads.remove(tid);
            }
        }
        let freed = teams.remove_from_group(self.id);
        teams.remove_from_parent(self.id);
        let team = teams.delete(self.id);
        drop(teams);
        drop(freed);
        drop(team);
        warn!("[team] creation of team {} rolled back", self.id);
    }
}
