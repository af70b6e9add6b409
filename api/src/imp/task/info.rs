use crate::teams;
use axerrno::{LinuxError, LinuxResult};
use bytemuck::{Pod, Zeroable};
use team_core::{ProcessInfoKind, TeamInfo};
use team_process::{Pid, TEAM_ARGS_LENGTH};

/// `team_info` as user space sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct UserTeamInfo {
    pub team: i32,
    pub thread_count: i32,
    pub image_count: i32,
    pub area_count: i32,
    /// -1 without a debugger.
    pub debugger_nub_thread: i32,
    pub debugger_nub_port: i32,
    pub argc: i32,
    /// NUL-terminated.
    pub args: [u8; TEAM_ARGS_LENGTH],
}

impl UserTeamInfo {
    pub fn args(&self) -> &str {
        let len = self.args.iter().position(|&b| b == 0).unwrap_or(self.args.len());
        core::str::from_utf8(&self.args[..len]).unwrap_or("")
    }
}

impl From<TeamInfo> for UserTeamInfo {
    fn from(info: TeamInfo) -> Self {
        let mut args = [0u8; TEAM_ARGS_LENGTH];
        let len = info.args.len().min(TEAM_ARGS_LENGTH - 1);
        args[..len].copy_from_slice(&info.args.as_bytes()[..len]);
        Self {
            team: info.team,
            thread_count: info.thread_count as _,
            image_count: info.image_count as _,
            area_count: info.area_count as _,
            debugger_nub_thread: info.debugger_nub_thread.unwrap_or(-1),
            debugger_nub_port: info.debugger_nub_port.unwrap_or(-1),
            argc: info.argc as _,
            args,
        }
    }
}

pub fn sys_get_team_info_impl(team: Pid) -> LinuxResult<UserTeamInfo> {
    Ok(teams()?.team_info(team)?.into())
}

/// Returns the next team after `cookie` and the cookie to continue with.
pub fn sys_get_next_team_info_impl(cookie: Pid) -> LinuxResult<(Pid, UserTeamInfo)> {
    let mut cookie = cookie;
    let info = teams()?.next_team_info(&mut cookie)?;
    Ok((cookie, info.into()))
}

pub fn sys_process_info_impl(pid: Pid, which: i32) -> LinuxResult<isize> {
    let which = ProcessInfoKind::try_from(which).map_err(|_| LinuxError::EINVAL)?;
    Ok(teams()?.process_info(pid, which)? as _)
}

pub fn sys_getpid_impl() -> LinuxResult<isize> {
    Ok(teams()?.getpid()? as _)
}

pub fn sys_getppid_impl() -> LinuxResult<isize> {
    Ok(teams()?.getppid()? as _)
}
