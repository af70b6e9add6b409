use crate::imp::task::{UserTeamInfo, sys_get_next_team_info_impl, sys_get_team_info_impl};
use crate::ptr::{PtrWrapper, UserInOutPtr, UserOutPtr};
use axerrno::LinuxResult;
use core::ffi::c_int;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_get_team_info(team: c_int, info: UserOutPtr<UserTeamInfo>) -> LinuxResult<isize> {
    info.write(sys_get_team_info_impl(team)?)?;
    Ok(0)
}

/// `cookie` starts at 0 and is advanced past each returned team.
#[syscall_trace]
pub fn sys_get_next_team_info(cookie: UserInOutPtr<i32>, info: UserOutPtr<UserTeamInfo>) -> LinuxResult<isize> {
    let (next, team) = sys_get_next_team_info_impl(cookie.read()?)?;
    info.write(team)?;
    cookie.write(next)?;
    Ok(0)
}
