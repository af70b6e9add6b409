use crate::death::DeathLedger;
use crate::{Pid, PortId, Tid};
use alloc::collections::BTreeSet;
use alloc::string::String;
use bitflags::bitflags;

/// Longest team or thread name kept, including the terminator slot.
pub const OS_NAME_LENGTH: usize = 32;
/// Longest argument summary kept for `team_info`, including the terminator slot.
pub const TEAM_ARGS_LENGTH: usize = 64;

/// Lifecycle state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeamState {
    /// Being constructed; the first image is not loaded yet.
    Birth,
    Normal,
    /// Unlinked from the tree and its group; the destructor is running.
    Death,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u32 {
        const DEBUGGER_INSTALLED = 0x0001;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugInfo {
    pub flags: DebugFlags,
    pub nub_thread: Option<Tid>,
    pub nub_port: Option<PortId>,
    pub debugger_port: Option<PortId>,
}

impl DebugInfo {
    pub fn installed(&self) -> bool {
        self.flags.contains(DebugFlags::DEBUGGER_INSTALLED)
    }
}

/// One team in the global table. `T` carries the resources owned by the
/// lifecycle engine (address space, descriptor table, watchers, ...).
pub struct TeamNode<T> {
    id: Pid,
    name: String,
    args: String,
    argc: usize,
    pub(crate) state: TeamState,
    pub(crate) parent: Option<Pid>,
    pub(crate) children: BTreeSet<Pid>,
    /// Group the team currently belongs to; `None` once it was unlinked.
    pub(crate) group: Option<Pid>,
    pub(crate) group_id: Pid,
    pub(crate) session_id: Pid,
    pub(crate) threads: BTreeSet<Tid>,
    pub(crate) main_thread: Option<Tid>,
    pub pending_signals: u64,
    pub dead_threads_kernel_time: u64,
    pub dead_threads_user_time: u64,
    pub(crate) ledger: DeathLedger,
    pub debug: DebugInfo,
    pub resources: T,
}

impl<T> TeamNode<T> {
    pub fn new(id: Pid, name: &str, ledger: DeathLedger, resources: T) -> Self {
        let mut team = Self {
            id,
            name: String::new(),
            args: String::new(),
            argc: 0,
            state: TeamState::Birth,
            parent: None,
            children: BTreeSet::new(),
            group: None,
            group_id: -1,
            session_id: -1,
            threads: BTreeSet::new(),
            main_thread: None,
            pending_signals: 0,
            dead_threads_kernel_time: 0,
            dead_threads_user_time: 0,
            ledger,
            debug: DebugInfo::default(),
            resources,
        };
        team.set_name(name);
        team
    }

    pub fn get_pid(&self) -> Pid {
        self.id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncated(name, OS_NAME_LENGTH - 1);
    }

    pub fn get_args(&self) -> &str {
        &self.args
    }

    /// Number of arguments the image was started with. Counted when the
    /// arguments are copied in, `args` is only a bounded display string.
    pub fn get_argc(&self) -> usize {
        self.argc
    }

    pub fn set_args(&mut self, args: &str, argc: usize) {
        self.args = truncated(args, TEAM_ARGS_LENGTH - 1);
        self.argc = argc;
    }

    pub fn get_state(&self) -> TeamState {
        self.state
    }

    /// Moves the state forward. Going back is an invariant violation.
    pub fn advance_state(&mut self, state: TeamState) {
        assert!(
            state >= self.state,
            "[team] team {} cannot go from {:?} back to {:?}",
            self.id,
            self.state,
            state
        );
        self.state = state;
    }

    pub fn is_alive(&self) -> bool {
        self.state != TeamState::Death
    }

    pub fn get_parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = Pid> + '_ {
        self.children.iter().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn get_group_id(&self) -> Pid {
        self.group_id
    }

    pub fn get_session_id(&self) -> Pid {
        self.session_id
    }

    pub fn in_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn is_group_leader(&self) -> bool {
        self.group_id == self.id
    }

    pub fn is_session_leader(&self) -> bool {
        self.session_id == self.id
    }

    pub fn threads(&self) -> impl Iterator<Item = Tid> + '_ {
        self.threads.iter().copied()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn get_main_thread(&self) -> Option<Tid> {
        self.main_thread
    }

    pub fn add_thread(&mut self, tid: Tid, main: bool) {
        self.threads.insert(tid);
        if main {
            self.main_thread = Some(tid);
        }
    }

    /// Returns whether `tid` was the main thread.
    pub fn remove_thread(&mut self, tid: Tid) -> bool {
        self.threads.remove(&tid);
        self.main_thread == Some(tid)
    }

    pub fn ledger(&self) -> &DeathLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut DeathLedger {
        &mut self.ledger
    }
}

/// Cuts `s` to at most `max` bytes without splitting a character.
pub(crate) fn truncated(s: &str, max: usize) -> String {
    if s.len() <= max {
        return String::from(s);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&s[..end])
}
