use crate::teams;
use axerrno::{LinuxError, LinuxResult};
use team_core::{ChildExit, WaitFlags};
use team_process::{Pid, WaitTarget};

/// Collects a dead child. `child` is `> 0` for one child, `-1` for any,
/// `< -1` for the process group `-child`; `0` (the caller's own group) is
/// not supported.
pub fn sys_wait_for_child_impl(child: Pid, flags: u32) -> LinuxResult<ChildExit> {
    let flags = WaitFlags::from_bits(flags).ok_or(LinuxError::EINVAL)?;
    let target = WaitTarget::from_raw(child);
    Ok(teams()?.wait_for_child(target, flags)?)
}
