use crate::imp::task::{sys_exit_team_impl, sys_kill_team_impl, sys_kill_thread_impl};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_exit_team(status: c_int) -> LinuxResult<isize> {
    sys_exit_team_impl(status)
}

#[syscall_trace]
pub fn sys_kill_team(team: c_int) -> LinuxResult<isize> {
    sys_kill_team_impl(team)
}

#[syscall_trace]
pub fn sys_kill_thread(thread: c_int) -> LinuxResult<isize> {
    sys_kill_thread_impl(thread)
}
