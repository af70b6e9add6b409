//! A thread-backed simulation of the services the team engine runs on.
//!
//! Every kernel thread is a host thread. A "program" is a closure
//! registered under a path; entering user space calls it and its return
//! value becomes the exit status. All teams share one flat user memory
//! ([`HostUserMemory`]) for syscall arguments, while each team gets its own
//! [`HostAddressSpace`] for stacks and loaded images.

mod io;
mod loader;
mod misc;
mod sched;
mod vm;

pub use io::{HostIoContext, HostIoContexts};
pub use loader::{HostArch, HostLoader, ProgramContext, set_fork_continuation};
pub use misc::{DebugEvent, Faults, FaultPoint, HostDebugger, HostIpc, HostUserMemory, USER_BASE, USER_END};
pub use sched::{HostScheduler, HostWaitQueue};
pub use vm::{HostAddressSpace, HostVm};

use crate::config::TeamConfig;
use crate::manager::TeamManager;
use crate::platform::Platform;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use team_process::TeamResult;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All host services, wired to each other.
#[derive(Clone)]
pub struct HostPlatform {
    pub scheduler: Arc<HostScheduler>,
    pub vm: Arc<HostVm>,
    pub io: Arc<HostIoContexts>,
    pub loader: Arc<HostLoader>,
    pub arch: Arc<HostArch>,
    pub ipc: Arc<HostIpc>,
    pub debugger: Arc<HostDebugger>,
    pub user: Arc<HostUserMemory>,
    pub faults: Arc<Faults>,
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform {
    pub fn new() -> Self {
        let faults = Arc::new(Faults::default());
        let scheduler = HostScheduler::new(faults.clone());
        let loader = Arc::new(HostLoader::new());
        let arch = Arc::new(HostArch::new(loader.clone(), scheduler.clone()));
        Self {
            vm: Arc::new(HostVm::new(faults.clone())),
            io: Arc::new(HostIoContexts::new(faults.clone())),
            loader,
            arch,
            scheduler,
            ipc: Arc::new(HostIpc::default()),
            debugger: Arc::new(HostDebugger::default()),
            user: Arc::new(HostUserMemory::new()),
            faults,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            scheduler: self.scheduler.clone(),
            vm: self.vm.clone(),
            io: self.io.clone(),
            loader: self.loader.clone(),
            ipc: self.ipc.clone(),
            debugger: self.debugger.clone(),
            arch: self.arch.clone(),
            user: self.user.clone(),
        }
    }

    /// Creates the manager; the calling host thread becomes the kernel
    /// team's main thread.
    pub fn boot(&self, config: TeamConfig) -> TeamResult<Arc<TeamManager>> {
        let manager = TeamManager::new(config, self.platform())?;
        self.scheduler.adopt_current(manager.kernel_team());
        Ok(manager)
    }

    pub fn register_program<F>(&self, path: &str, program: F)
    where
        F: Fn(&ProgramContext) -> i32 + Send + Sync + 'static,
    {
        self.loader.register(path, Arc::new(program));
    }
}
