use crate::imp::task::sys_wait_for_child_impl;
use crate::ptr::{PtrWrapper, UserOutPtr};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

/// Returns the ID of the reaped thread. `reason` receives
/// `(signal << 16) | reason` and `status` the exit status, each only when
/// given.
#[syscall_trace]
pub fn sys_wait_for_child(
    child: c_int,
    flags: u32,
    reason: UserOutPtr<i32>,
    status: UserOutPtr<i32>,
) -> LinuxResult<isize> {
    let exit = sys_wait_for_child_impl(child, flags)?;
    reason.write_if_present(exit.reason)?;
    status.write_if_present(exit.status)?;
    Ok(exit.thread as _)
}
