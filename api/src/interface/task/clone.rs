use crate::imp::task::sys_fork_impl;
use axerrno::LinuxResult;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_fork() -> LinuxResult<isize> {
    sys_fork_impl()
}
