use crate::imp::task::{UserTeamUsage, sys_get_team_usage_info_impl};
use crate::ptr::{PtrWrapper, UserOutPtr};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

/// `who` is 0 for the team itself and -1 for its children.
#[syscall_trace]
pub fn sys_get_team_usage_info(team: c_int, who: c_int, info: UserOutPtr<UserTeamUsage>) -> LinuxResult<isize> {
    info.write(sys_get_team_usage_info_impl(team, who)?)?;
    Ok(0)
}
