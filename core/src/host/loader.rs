use super::lock;
use super::sched::HostScheduler;
use crate::mm::ProgramArgs;
use crate::platform::{AddressSpace, Arch, ForkFrame, ImageLoader, Protection};
use std::boxed::Box;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::string::String;
use std::sync::{Arc, Mutex};
use std::vec::Vec;
use team_process::{Pid, TeamError, TeamResult};

/// Where the simulated runtime loader gets mapped.
const LOADER_BASE: usize = 0x0020_0000;
const LOADER_SIZE: usize = 0x4000;
const PROGRAM_ENTRY_BASE: usize = 0x0100_0000;

/// What a program sees when it starts.
#[derive(Debug, Clone)]
pub struct ProgramContext {
    pub team: Pid,
    pub path: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
}

pub(crate) type HostProgram = Arc<dyn Fn(&ProgramContext) -> i32 + Send + Sync>;

type ForkContinuation = Box<dyn FnOnce() -> i32 + Send>;

thread_local! {
    static FORK_CONTINUATION: RefCell<Option<ForkContinuation>> = const { RefCell::new(None) };
}

/// Sets what the child of the next `fork` on this thread runs; its return
/// value is the child's exit status. Without one the child exits with 0.
pub fn set_fork_continuation(continuation: impl FnOnce() -> i32 + Send + 'static) {
    FORK_CONTINUATION.with(|slot| *slot.borrow_mut() = Some(Box::new(continuation)));
}

pub struct HostLoader {
    programs: Mutex<BTreeMap<String, HostProgram>>,
    images: Mutex<BTreeMap<Pid, usize>>,
}

impl Default for HostLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoader {
    pub fn new() -> Self {
        Self {
            programs: Mutex::new(BTreeMap::new()),
            images: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn register(&self, path: &str, program: HostProgram) {
        lock(&self.programs).insert(String::from(path), program);
    }

    fn program(&self, path: &str) -> Option<HostProgram> {
        lock(&self.programs).get(path).cloned()
    }

    fn entry_of(&self, path: &str) -> Option<usize> {
        let programs = lock(&self.programs);
        let index = programs.keys().position(|known| known == path)?;
        Some(PROGRAM_ENTRY_BASE + index * 0x1000)
    }
}

impl ImageLoader for HostLoader {
    fn load_program(&self, path: &str, program: &ProgramArgs, team: Pid, space: &dyn AddressSpace) -> TeamResult<usize> {
        let entry = self.entry_of(&program.path).ok_or(TeamError::NotFound)?;
        space.create_area(path, LOADER_BASE, LOADER_SIZE, Protection::READ | Protection::EXEC)?;
        // the runtime loader plus the program itself
        *lock(&self.images).entry(team).or_default() += 2;
        Ok(entry)
    }

    fn remove_images(&self, team: Pid) {
        lock(&self.images).remove(&team);
    }

    fn image_count(&self, team: Pid) -> usize {
        lock(&self.images).get(&team).copied().unwrap_or(0)
    }
}

pub struct HostArch {
    loader: Arc<HostLoader>,
    scheduler: Arc<HostScheduler>,
}

impl HostArch {
    pub fn new(loader: Arc<HostLoader>, scheduler: Arc<HostScheduler>) -> Self {
        Self { loader, scheduler }
    }
}

impl Arch for HostArch {
    fn enter_userspace(&self, team: Pid, _entry: usize, program: &ProgramArgs) -> TeamResult<i32> {
        let body = self.loader.program(&program.path).ok_or(TeamError::NotFound)?;
        // a kill that arrived before the first instruction
        if self.scheduler.current_killed() {
            return Ok(0);
        }
        let context = ProgramContext {
            team,
            path: program.path.clone(),
            args: program.args.clone(),
            env: program.env.clone(),
        };
        Ok(body(&context))
    }

    fn store_fork_frame(&self) -> ForkFrame {
        let continuation: ForkContinuation = FORK_CONTINUATION
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| Box::new(|| 0));
        ForkFrame(Box::new(continuation))
    }

    fn restore_fork_frame(&self, frame: ForkFrame) -> i32 {
        if self.scheduler.current_killed() {
            return 0;
        }
        match frame.0.downcast::<ForkContinuation>() {
            Ok(continuation) => (*continuation)(),
            Err(_) => 0,
        }
    }
}
