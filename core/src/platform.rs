//! The kernel services the team engine is built on. Each one is a trait so
//! the engine can be driven by a real kernel or by the host simulation.

use crate::mm::ProgramArgs;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::any::Any;
use team_process::{Pid, PortId, Signal, TeamError, TeamResult, Tid, WaitQueue};

/// Body of a newly spawned kernel thread.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

pub type AreaId = i32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
        const STACK = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaInfo {
    pub id: AreaId,
    pub name: String,
    pub base: usize,
    pub size: usize,
    pub protection: Protection,
}

pub trait Scheduler: Send + Sync {
    fn current_thread(&self) -> Tid;

    /// Starts a thread with a caller-chosen ID. On failure `entry` has been
    /// dropped without running.
    fn spawn(&self, tid: Tid, name: &str, priority: i32, entry: ThreadEntry) -> TeamResult<()>;

    fn send_signal(&self, tid: Tid, signal: Signal);

    fn new_wait_queue(&self) -> Arc<dyn WaitQueue>;

    /// Ends the calling thread. Its bookkeeping must already be gone.
    fn terminate_current(&self) -> !;
}

pub trait AddressSpace: Send + Sync {
    fn areas(&self) -> Vec<AreaInfo>;

    fn create_area(&self, name: &str, base: usize, size: usize, protection: Protection) -> TeamResult<AreaId>;

    /// Copy-on-write clone of `area` of `source`, at the same address.
    fn copy_area(&self, source: &dyn AddressSpace, area: &AreaInfo) -> TeamResult<AreaId>;

    fn read(&self, addr: usize, buf: &mut [u8]) -> TeamResult<()>;

    fn write(&self, addr: usize, data: &[u8]) -> TeamResult<()>;

    /// Unmaps everything, leaving an empty space behind (used by exec).
    fn delete_areas(&self);
}

/// The address space itself is released when the last `Arc` goes away.
pub trait VirtualMemory: Send + Sync {
    fn create_address_space(&self, team: Pid) -> TeamResult<Arc<dyn AddressSpace>>;

    fn kernel_address_space(&self) -> Arc<dyn AddressSpace>;
}

/// A team's descriptor table. Dropping it closes everything.
pub trait IoContext: Send + Sync {
    fn duplicate(&self) -> TeamResult<Box<dyn IoContext>>;

    /// Closes the descriptors marked close-on-exec.
    fn exec(&mut self);

    fn descriptor_count(&self) -> usize;
}

pub trait IoContexts: Send + Sync {
    fn new_io_context(&self) -> TeamResult<Box<dyn IoContext>>;
}

pub trait ImageLoader: Send + Sync {
    /// Maps `path` (the runtime loader) into `space` and returns its entry
    /// point. The program to run is described by `program`.
    fn load_program(&self, path: &str, program: &ProgramArgs, team: Pid, space: &dyn AddressSpace) -> TeamResult<usize>;

    fn remove_images(&self, team: Pid);

    fn image_count(&self, team: Pid) -> usize;
}

/// Ports and semaphores are owned by teams and die with them.
pub trait Ipc: Send + Sync {
    fn delete_owned_ports(&self, team: Pid);

    fn delete_owned_sems(&self, team: Pid);
}

pub trait Debugger: Send + Sync {
    fn team_created(&self, team: Pid);

    /// `debugger_port` is the port captured while the team was unlinked.
    fn team_deleted(&self, team: Pid, debugger_port: Option<PortId>);

    fn prepare_for_exec(&self, team: Pid);

    fn finish_after_exec(&self, team: Pid);
}

/// Saved user register state of a forking thread.
pub struct ForkFrame(pub Box<dyn Any + Send>);

pub trait Arch: Send + Sync {
    /// Jumps to user space at `entry`. Only returns in a simulation, with
    /// the status the program finished with.
    fn enter_userspace(&self, team: Pid, entry: usize, program: &ProgramArgs) -> TeamResult<i32>;

    fn store_fork_frame(&self) -> ForkFrame;

    /// Resumes a fork child from `frame`; the child sees fork return 0.
    fn restore_fork_frame(&self, frame: ForkFrame) -> i32;
}

/// Access to the calling team's user memory.
pub trait UserMemory: Send + Sync {
    fn is_user_address(&self, addr: usize) -> bool;

    fn read(&self, addr: usize, buf: &mut [u8]) -> TeamResult<()>;

    fn write(&self, addr: usize, data: &[u8]) -> TeamResult<()>;

    fn read_usize(&self, addr: usize) -> TeamResult<usize> {
        let mut buf = [0u8; core::mem::size_of::<usize>()];
        self.read(addr, &mut buf)?;
        Ok(usize::from_ne_bytes(buf))
    }

    /// Copies a NUL-terminated string of at most `max - 1` bytes; longer
    /// strings are cut like `strlcpy` does, dropping a character split by
    /// the cut. Strings that are not UTF-8 are refused with `BadValue`
    /// rather than rewritten.
    fn read_cstr(&self, addr: usize, max: usize) -> TeamResult<String> {
        if !self.is_user_address(addr) {
            return Err(TeamError::BadAddress);
        }
        let mut bytes = Vec::new();
        let mut byte = [0u8];
        let mut terminated = false;
        while bytes.len() + 1 < max {
            self.read(addr + bytes.len(), &mut byte)?;
            if byte[0] == 0 {
                terminated = true;
                break;
            }
            bytes.push(byte[0]);
        }
        match String::from_utf8(bytes) {
            Ok(string) => Ok(string),
            Err(err) if !terminated && err.utf8_error().error_len().is_none() => {
                let valid = err.utf8_error().valid_up_to();
                let mut bytes = err.into_bytes();
                bytes.truncate(valid);
                String::from_utf8(bytes).map_err(|_| TeamError::BadValue)
            }
            Err(_) => Err(TeamError::BadValue),
        }
    }
}

/// Every collaborator the engine needs, bundled.
#[derive(Clone)]
pub struct Platform {
    pub scheduler: Arc<dyn Scheduler>,
    pub vm: Arc<dyn VirtualMemory>,
    pub io: Arc<dyn IoContexts>,
    pub loader: Arc<dyn ImageLoader>,
    pub ipc: Arc<dyn Ipc>,
    pub debugger: Arc<dyn Debugger>,
    pub arch: Arc<dyn Arch>,
    pub user: Arc<dyn UserMemory>,
}
