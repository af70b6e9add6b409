use crate::imp::task::sys_load_image_impl;
use crate::ptr::{PtrWrapper, UserInPtr};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_load_image(
    argv: UserInPtr<usize>,
    argc: usize,
    envp: UserInPtr<usize>,
    envc: usize,
    priority: c_int,
    flags: u32,
) -> LinuxResult<isize> {
    sys_load_image_impl(argv, argc, envp, envc, priority, flags)
}
