//! The team syscalls: argument decoding, user memory access and errno
//! mapping on top of [`team_core::TeamManager`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod imp;
pub mod interface;
pub mod ptr;
pub mod syscall;

use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use spin::Once;
use team_core::TeamManager;

static TEAMS: Once<Arc<TeamManager>> = Once::new();

/// Hands the syscall layer its manager. Only the first call has an effect.
pub fn init(manager: Arc<TeamManager>) {
    let manager = TEAMS.call_once(|| manager);
    info!("[api] team syscalls ready, kernel team {}", manager.kernel_team());
}

pub(crate) fn teams() -> LinuxResult<&'static Arc<TeamManager>> {
    TEAMS.get().ok_or(LinuxError::ENOSYS)
}
