use crate::imp::task::{
    sys_getpid_impl, sys_getppid_impl, sys_process_info_impl, sys_setpgid_impl, sys_setsid_impl,
};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_getpid() -> LinuxResult<isize> {
    sys_getpid_impl()
}

#[syscall_trace]
pub fn sys_getppid() -> LinuxResult<isize> {
    sys_getppid_impl()
}

/// `which` is 1 for the session, 2 for the group and 3 for the parent.
#[syscall_trace]
pub fn sys_process_info(pid: c_int, which: c_int) -> LinuxResult<isize> {
    sys_process_info_impl(pid, which)
}

#[syscall_trace]
pub fn sys_setpgid(pid: c_int, pgid: c_int) -> LinuxResult<isize> {
    sys_setpgid_impl(pid, pgid)
}

#[syscall_trace]
pub fn sys_setsid() -> LinuxResult<isize> {
    sys_setsid_impl()
}
