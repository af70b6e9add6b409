use crate::imp::task::sys_exec_impl;
use crate::ptr::{PtrWrapper, UserInPtr};
use axerrno::LinuxResult;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_exec(
    path: UserInPtr<u8>,
    argv: UserInPtr<usize>,
    argc: usize,
    envp: UserInPtr<usize>,
    envc: usize,
) -> LinuxResult<isize> {
    sys_exec_impl(path, argv, argc, envp, envc)
}
